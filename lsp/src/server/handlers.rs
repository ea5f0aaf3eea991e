use serde_json::Value;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::request::{
    GotoDeclarationParams, GotoDeclarationResponse, GotoImplementationParams, GotoImplementationResponse,
    GotoTypeDefinitionParams, GotoTypeDefinitionResponse,
};
use tower_lsp::lsp_types::*;
use tower_lsp::LanguageServer;
use tracing::{error, info};

use spxls_core::token::NO_POS;
use spxls_core::typ::Type;

use crate::analyzer::{document_highlights, semantic_token_legend, CompileError, CompileResult};

use super::features;
use super::state::SpxLanguageServer;
use super::text::FileChange;

fn internal_error(err: &CompileError) -> Error {
    let mut e = Error::internal_error();
    e.message = err.to_string().into();
    e
}

impl SpxLanguageServer {
    /// Shared head of every document request: map the URI, compile the
    /// current snapshot. Returns None for URIs outside the workspace or
    /// without the dialect extension.
    fn compile_for_uri(&self, uri: &Url) -> Result<Option<(CompileResult, String)>> {
        let Some(path) = self.from_document_uri(uri) else {
            return Ok(None);
        };
        if !path.ends_with(".spx") {
            return Ok(None);
        }
        match self.compile() {
            Ok(result) => Ok(Some((result, path))),
            Err(err) => Err(internal_error(&err)),
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for SpxLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        self.set_root_uri(params.root_uri.as_ref());

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::INCREMENTAL),
                    save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                        include_text: Some(true),
                    })),
                    ..Default::default()
                })),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    trigger_characters: Some(vec![".".to_string(), "\"".to_string()]),
                    ..Default::default()
                }),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: Some(vec!["(".to_string(), ",".to_string(), " ".to_string()]),
                    retrigger_characters: None,
                    work_done_progress_options: Default::default(),
                }),
                declaration_provider: Some(DeclarationCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                type_definition_provider: Some(TypeDefinitionProviderCapability::Simple(true)),
                implementation_provider: Some(ImplementationProviderCapability::Simple(true)),
                references_provider: Some(OneOf::Left(true)),
                document_highlight_provider: Some(OneOf::Left(true)),
                document_link_provider: Some(DocumentLinkOptions {
                    resolve_provider: Some(false),
                    work_done_progress_options: Default::default(),
                }),
                diagnostic_provider: Some(DiagnosticServerCapabilities::Options(DiagnosticOptions {
                    identifier: Some("spxls".to_string()),
                    inter_file_dependencies: true,
                    workspace_diagnostics: true,
                    work_done_progress_options: Default::default(),
                })),
                document_formatting_provider: Some(OneOf::Left(true)),
                rename_provider: Some(OneOf::Right(RenameOptions {
                    prepare_provider: Some(true),
                    work_done_progress_options: Default::default(),
                })),
                semantic_tokens_provider: Some(SemanticTokensServerCapabilities::SemanticTokensOptions(
                    SemanticTokensOptions {
                        work_done_progress_options: Default::default(),
                        legend: semantic_token_legend(),
                        range: None,
                        full: Some(SemanticTokensFullOptions::Bool(true)),
                    },
                )),
                inlay_hint_provider: Some(OneOf::Right(InlayHintServerCapabilities::Options(InlayHintOptions {
                    work_done_progress_options: Default::default(),
                    resolve_provider: Some(false),
                }))),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec!["spx.renameResources".to_string()],
                    work_done_progress_options: Default::default(),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "spxls".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("spx language server initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let Some(path) = self.from_document_uri(&params.text_document.uri) else {
            return;
        };
        self.did_modify_file(vec![FileChange {
            path,
            content: params.text_document.text.into(),
            version: i64::from(params.text_document.version),
        }]);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let Some(path) = self.from_document_uri(&params.text_document.uri) else {
            return;
        };
        match self.changed_text(&path, params.content_changes) {
            Ok(content) => self.did_modify_file(vec![FileChange {
                path,
                content: content.into(),
                version: i64::from(params.text_document.version),
            }]),
            Err(err) => error!("didChange for {path} rejected: {err}"),
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        // Only a save carrying text modifies the snapshot; the generated
        // version lives in a separate space above all client versions.
        let Some(text) = params.text else { return };
        let Some(path) = self.from_document_uri(&params.text_document.uri) else {
            return;
        };
        let version = self.next_save_version();
        self.did_modify_file(vec![FileChange {
            path,
            content: text.into(),
            version,
        }]);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        // Clear the document's diagnostics on close.
        self.client
            .publish_diagnostics(params.text_document.uri, Vec::new(), None)
            .await;
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let Some((result, path)) = self.compile_for_uri(uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        Ok(features::hover_for(
            &result,
            source,
            params.text_document_position_params.position,
        ))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = &params.text_document_position.text_document.uri;
        let Some((result, path)) = self.compile_for_uri(uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        let items = features::completion_items(&result, source, params.text_document_position.position);
        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let Some((result, path)) = self.compile_for_uri(uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        Ok(features::signature_help_for(
            &result,
            source,
            params.text_document_position_params.position,
        ))
    }

    async fn goto_declaration(&self, params: GotoDeclarationParams) -> Result<Option<GotoDeclarationResponse>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let Some((result, path)) = self.compile_for_uri(uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        let Some(ident) = result.ident_at_position(source, position) else {
            return Ok(None);
        };
        let location = result
            .tinfo
            .object_of(ident.pos)
            .and_then(|obj| result.location_for_object(obj))
            .map(|(uri, range)| Location { uri, range });
        Ok(location.map(GotoDeclarationResponse::Scalar))
    }

    async fn goto_definition(&self, params: GotoDefinitionParams) -> Result<Option<GotoDefinitionResponse>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let Some((result, path)) = self.compile_for_uri(uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        let Some(ident) = result.ident_at_position(source, position) else {
            return Ok(None);
        };
        let location = result
            .tinfo
            .object_of(ident.pos)
            .and_then(|obj| result.location_for_object(obj))
            .map(|(uri, range)| Location { uri, range });
        Ok(location.map(GotoDefinitionResponse::Scalar))
    }

    async fn goto_type_definition(
        &self,
        params: GotoTypeDefinitionParams,
    ) -> Result<Option<GotoTypeDefinitionResponse>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let Some((result, path)) = self.compile_for_uri(uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        let Some(ident) = result.ident_at_position(source, position) else {
            return Ok(None);
        };
        let Some(obj) = result.tinfo.object_of(ident.pos) else {
            return Ok(None);
        };
        let location = match result.tinfo.object(obj).typ.clone() {
            Type::Named(named) => {
                let type_obj = result.tinfo.named_type(named).obj;
                result
                    .location_for_object(type_obj)
                    .map(|(uri, range)| Location { uri, range })
            }
            _ => None,
        };
        Ok(location.map(GotoTypeDefinitionResponse::Scalar))
    }

    async fn goto_implementation(
        &self,
        params: GotoImplementationParams,
    ) -> Result<Option<GotoImplementationResponse>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let Some((result, path)) = self.compile_for_uri(uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        let Some(ident) = result.ident_at_position(source, position) else {
            return Ok(None);
        };
        let Some(obj) = result.tinfo.object_of(ident.pos) else {
            return Ok(None);
        };

        // An overloadable reference implements as every expanded overload.
        if let Some(overloads) = result.tinfo.expand_overloads(obj) {
            let locations: Vec<Location> = overloads
                .into_iter()
                .filter_map(|overload| result.location_for_object(overload))
                .map(|(uri, range)| Location { uri, range })
                .collect();
            if locations.is_empty() {
                return Ok(None);
            }
            return Ok(Some(GotoImplementationResponse::Array(locations)));
        }
        let location = result.location_for_object(obj).map(|(uri, range)| Location { uri, range });
        Ok(location.map(GotoImplementationResponse::Scalar))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let uri = &params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        let Some((result, path)) = self.compile_for_uri(uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        let Some(ident) = result.ident_at_position(source, position) else {
            return Ok(None);
        };
        let Some(obj) = result.tinfo.object_of(ident.pos) else {
            return Ok(None);
        };

        let mut locations = features::references_for_object(&result, obj);
        if !params.context.include_declaration {
            let decl_pos = result.tinfo.object(obj).decl_pos;
            if decl_pos != NO_POS {
                let decl_range = result.range_for_pos(decl_pos).start;
                locations.retain(|loc| loc.range.start != decl_range);
            }
        }
        Ok((!locations.is_empty()).then_some(locations))
    }

    async fn document_highlight(&self, params: DocumentHighlightParams) -> Result<Option<Vec<DocumentHighlight>>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let Some((result, path)) = self.compile_for_uri(uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        Ok(document_highlights(&result, source, position))
    }

    async fn document_link(&self, params: DocumentLinkParams) -> Result<Option<Vec<DocumentLink>>> {
        let Some((result, path)) = self.compile_for_uri(&params.text_document.uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        Ok(Some(result.document_links(source).to_vec()))
    }

    async fn diagnostic(&self, params: DocumentDiagnosticParams) -> Result<DocumentDiagnosticReportResult> {
        let uri = &params.text_document.uri;
        let items = match self.compile_for_uri(uri)? {
            Some((result, _)) => result.diagnostics.get(uri).cloned().unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(DocumentDiagnosticReportResult::Report(DocumentDiagnosticReport::Full(
            RelatedFullDocumentDiagnosticReport {
                related_documents: None,
                full_document_diagnostic_report: FullDocumentDiagnosticReport {
                    result_id: None,
                    items,
                },
            },
        )))
    }

    async fn workspace_diagnostic(
        &self,
        _params: WorkspaceDiagnosticParams,
    ) -> Result<WorkspaceDiagnosticReportResult> {
        let result = self.compile().map_err(|err| internal_error(&err))?;
        let items = result
            .files
            .values()
            .map(|source| {
                let uri = result.to_document_uri(&source.path);
                WorkspaceDocumentDiagnosticReport::Full(WorkspaceFullDocumentDiagnosticReport {
                    uri: uri.clone(),
                    version: i32::try_from(source.version).ok().map(i64::from),
                    full_document_diagnostic_report: FullDocumentDiagnosticReport {
                        result_id: None,
                        items: result.diagnostics.get(&uri).cloned().unwrap_or_default(),
                    },
                })
            })
            .collect();
        Ok(WorkspaceDiagnosticReportResult::Report(WorkspaceDiagnosticReport {
            items,
        }))
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        let Some((result, path)) = self.compile_for_uri(&params.text_document.uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        let formatted = features::format_document(&source.content);
        if formatted == *source.content {
            return Ok(Some(Vec::new()));
        }
        let end = result.lsp_position(source, source.token_file.end_pos());
        Ok(Some(vec![TextEdit {
            range: Range::new(Position::new(0, 0), end),
            new_text: formatted,
        }]))
    }

    async fn prepare_rename(&self, params: TextDocumentPositionParams) -> Result<Option<PrepareRenameResponse>> {
        let Some((result, path)) = self.compile_for_uri(&params.text_document.uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        let Some(ident) = result.ident_at_position(source, params.position) else {
            return Ok(None);
        };
        let Some(obj) = result.tinfo.object_of(ident.pos) else {
            return Ok(None);
        };
        if !features::is_renameable_object(&result, obj) {
            return Ok(None);
        }
        Ok(Some(PrepareRenameResponse::RangeWithPlaceholder {
            range: result.range_for_span((ident.pos, ident.end)),
            placeholder: ident.name,
        }))
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        let new_name = params.new_name;
        let is_valid = {
            let mut chars = new_name.chars();
            matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_')
        };
        if !is_valid {
            return Ok(None);
        }

        let uri = &params.text_document_position.text_document.uri;
        let Some((result, path)) = self.compile_for_uri(uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        let Some(ident) = result.ident_at_position(source, params.text_document_position.position) else {
            return Ok(None);
        };
        let Some(obj) = result.tinfo.object_of(ident.pos) else {
            return Ok(None);
        };
        if !features::is_renameable_object(&result, obj) {
            return Ok(None);
        }
        Ok(Some(features::rename_edits(&result, obj, &new_name)))
    }

    async fn semantic_tokens_full(&self, params: SemanticTokensParams) -> Result<Option<SemanticTokensResult>> {
        let Some((result, path)) = self.compile_for_uri(&params.text_document.uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        let data = result.semantic_tokens(source).to_vec();
        Ok(Some(SemanticTokensResult::Tokens(SemanticTokens {
            result_id: None,
            data,
        })))
    }

    async fn inlay_hint(&self, params: InlayHintParams) -> Result<Option<Vec<InlayHint>>> {
        let Some((result, path)) = self.compile_for_uri(&params.text_document.uri)? else {
            return Ok(None);
        };
        let Some(source) = result.source_file(&path) else {
            return Ok(None);
        };
        let hints = features::inlay_hints_for(&result, source, params.range);
        Ok((!hints.is_empty()).then_some(hints))
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        if params.command != "spx.renameResources" {
            return Err(Error::method_not_found());
        }
        let result = self.compile().map_err(|err| internal_error(&err))?;

        #[derive(serde::Deserialize)]
        struct RenameResourceArg {
            resource: ResourceArg,
            #[serde(rename = "newName")]
            new_name: String,
        }
        #[derive(serde::Deserialize)]
        struct ResourceArg {
            uri: String,
        }

        let mut merged: Option<WorkspaceEdit> = None;
        for raw in params.arguments {
            let arg: RenameResourceArg = serde_json::from_value(raw)
                .map_err(|err| Error::invalid_params(format!("invalid rename argument: {err}")))?;
            let edit = features::rename_resource_edits(&result, &arg.resource.uri, &arg.new_name);
            match &mut merged {
                None => merged = Some(edit),
                Some(acc) => {
                    if let (Some(into), Some(from)) = (acc.changes.as_mut(), edit.changes) {
                        for (uri, edits) in from {
                            into.entry(uri).or_default().extend(edits);
                        }
                    }
                }
            }
        }

        if let Some(edit) = merged {
            let _ = self.client.apply_edit(edit).await;
        }
        Ok(None)
    }
}
