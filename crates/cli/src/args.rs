//! Command-line parsing.

use std::convert::Infallible;
use std::path::PathBuf;

use clap::builder::ArgPredicate;
use clap::{Args, Parser, Subcommand};
use coloracao_client::service::ExtractionMode;

/// Coloração pessoal: extração de cores, classificação sazonal e
/// relatórios SVG.
#[derive(Parser, Debug)]
#[command(name = "coloracao", author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// A photo given either as a public URL or as a local file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    File(PathBuf),
}

impl ImageSource {
    pub fn from_arg(raw: &str) -> Result<Self, Infallible> {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Ok(Self::Url(raw.to_string()))
        } else {
            Ok(Self::File(PathBuf::from(raw)))
        }
    }
}

/// A color map given inline as JSON or as `@path` to a JSON file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorsSource {
    Inline(String),
    File(PathBuf),
}

impl ColorsSource {
    pub fn from_arg(raw: &str) -> Result<Self, Infallible> {
        Ok(match raw.strip_prefix('@') {
            Some(path) => Self::File(PathBuf::from(path)),
            None => Self::Inline(raw.to_string()),
        })
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeArgs {
    /// Foto frontal: URL pública ou arquivo local a enviar
    #[arg(long, value_name = "URL|ARQUIVO", value_parser = ImageSource::from_arg)]
    pub frontal: ImageSource,

    /// Foto do olho; a íris dela substitui a da foto frontal
    #[arg(long, value_name = "URL|ARQUIVO", value_parser = ImageSource::from_arg)]
    pub eye: Option<ImageSource>,

    /// Extrai a foto frontal e a do olho uma após a outra
    #[arg(long)]
    pub sequential: bool,

    /// Classifica as cores extraídas (implícito com --manual)
    #[arg(long, default_value_if("manual", ArgPredicate::IsPresent, "true"))]
    pub classify: bool,

    /// Cores manuais a classificar junto com as extraídas
    #[arg(long, value_name = "JSON|@ARQUIVO", value_parser = ColorsSource::from_arg)]
    pub manual: Option<ColorsSource>,

    /// Diretório para os relatórios SVG
    #[arg(long, value_name = "DIRETÓRIO")]
    pub out: Option<PathBuf>,
}

impl AnalyzeArgs {
    pub fn mode(&self) -> ExtractionMode {
        if self.sequential {
            ExtractionMode::Sequential
        } else {
            ExtractionMode::Parallel
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ClassifyArgs {
    /// Cores em JSON ou @caminho para um arquivo JSON
    #[arg(value_name = "JSON|@ARQUIVO", value_parser = ColorsSource::from_arg)]
    pub colors: ColorsSource,

    /// Deixa queixo e contorno da boca fora da classificação
    #[arg(long)]
    pub beard: bool,

    /// Diretório para os relatórios SVG
    #[arg(long, value_name = "DIRETÓRIO")]
    pub out: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Inicia uma sessão (válida por 24 horas)
    Login { username: String, password: String },
    /// Encerra a sessão
    Logout,
    /// Mostra a sessão e a configuração
    Status,
    /// Verifica as variáveis de ambiente
    CheckConfig,
    /// Lista as fotos de exemplo
    Samples,
    /// Envia uma foto e mostra a URL pública
    Upload {
        file: PathBuf,
        /// Envia como foto do olho
        #[arg(long)]
        eye: bool,
    },
    /// Extrai as cores de uma foto e, opcionalmente, classifica
    Analyze(AnalyzeArgs),
    /// Classifica um mapa de cores
    Classify(ClassifyArgs),
}

impl Command {
    /// Commands usable without a session.
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            Self::Login { .. } | Self::Logout | Self::Status | Self::CheckConfig
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(line: &str) -> Result<Command, clap::Error> {
        let argv = std::iter::once("coloracao").chain(line.split_whitespace());
        Cli::try_parse_from(argv).map(|cli| cli.command)
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn analyze_with_all_options() {
        let cmd = parse(
            "analyze --frontal https://img/f.png --eye ./olho.jpg --sequential --manual @cores.json --out rel",
        )
        .unwrap();

        let Command::Analyze(args) = cmd else {
            panic!("expected analyze");
        };
        assert_eq!(
            args,
            AnalyzeArgs {
                frontal: ImageSource::Url("https://img/f.png".into()),
                eye: Some(ImageSource::File("./olho.jpg".into())),
                sequential: true,
                classify: true,
                manual: Some(ColorsSource::File("cores.json".into())),
                out: Some("rel".into()),
            }
        );
        assert_eq!(args.mode(), ExtractionMode::Sequential);
    }

    #[test]
    fn classify_is_off_unless_asked_or_manual_given() {
        let Command::Analyze(args) = parse("analyze --frontal f.png").unwrap() else {
            panic!("expected analyze");
        };
        assert!(!args.classify);
        assert_eq!(args.mode(), ExtractionMode::Parallel);

        let Command::Analyze(args) = parse("analyze --frontal f.png --classify").unwrap() else {
            panic!("expected analyze");
        };
        assert!(args.classify);
        assert_eq!(args.manual, None);
    }

    #[test]
    fn analyze_requires_frontal() {
        let err = parse("analyze --eye https://img/o.png").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        assert!(parse("analyze --frontal").is_err());
    }

    #[test]
    fn upload_eye_flag_and_unknown_flags() {
        assert_eq!(
            parse("upload foto.png --eye").unwrap(),
            Command::Upload {
                file: "foto.png".into(),
                eye: true
            }
        );
        let err = parse("upload foto.png --olho").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn classify_inline_json() {
        let argv = ["coloracao", "classify", r##"{"iris":"#000000"}"##, "--beard"];
        let cmd = Cli::try_parse_from(argv).unwrap().command;
        assert_eq!(
            cmd,
            Command::Classify(ClassifyArgs {
                colors: ColorsSource::Inline(r##"{"iris":"#000000"}"##.into()),
                beard: true,
                out: None,
            })
        );
    }

    #[test]
    fn only_session_and_config_commands_are_public() {
        assert!(parse("status").unwrap().is_public());
        assert!(parse("check-config").unwrap().is_public());
        assert!(parse("login ana segredo").unwrap().is_public());
        assert!(!parse("samples").unwrap().is_public());
        assert!(!parse("upload a.png").unwrap().is_public());
        assert_eq!(
            parse("paint").unwrap_err().kind(),
            ErrorKind::InvalidSubcommand
        );
    }
}
