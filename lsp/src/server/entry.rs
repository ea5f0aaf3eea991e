use tower_lsp::{LspService, Server};

use super::cli::try_cli_analyze;
use super::state::SpxLanguageServer;

pub async fn run() {
    match try_cli_analyze() {
        Ok(Some(output)) => {
            println!("{output}");
            return;
        }
        Ok(None) => {}
        Err(err) => {
            eprintln!("spxls analyze error: {err}");
            std::process::exit(2);
        }
    }

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(SpxLanguageServer::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
