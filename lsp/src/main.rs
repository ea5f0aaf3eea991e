#[tokio::main]
async fn main() {
    spxls_lsp::server::run().await;
}
