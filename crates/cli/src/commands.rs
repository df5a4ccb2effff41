//! Command execution.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use coloracao_client::config::{validate_configuration, ApiConfig, Endpoint};
use coloracao_client::env::EnvSource;
use coloracao_client::poll::StatusCallback;
use coloracao_client::transport::{mask, Progress, Reply, Request};
use coloracao_client::upload::{UploadFile, UploadKind};
use coloracao_client::{ApiClient, ColoracaoService, UploadService};
use coloracao_core::colors::ManualColorInput;
use coloracao_core::extraction::CombinedAnalysisResult;
use coloracao_core::job::JobType;
use coloracao_core::overlay::Size;
use coloracao_core::session::{
    Clock, Credentials, FileStorage, SessionStorage, SessionStore, SystemClock,
};
use coloracao_core::types::ColorMap;
use tokio_util::sync::CancellationToken;

use crate::args::{AnalyzeArgs, ClassifyArgs, ColorsSource, Command, ImageSource};
use crate::render;
use crate::report::{self, ReportFile};

/// Frontal sample photos hosted by the backend team.
pub const SAMPLE_IMAGES: [&str; 14] = [
    "https://tantto-assinaturas.s3.us-east-1.amazonaws.com/gennie-mock/frontal/1.png",
    "https://tantto-assinaturas.s3.us-east-1.amazonaws.com/gennie-mock/frontal/2.png",
    "https://tantto-assinaturas.s3.us-east-1.amazonaws.com/gennie-mock/frontal/3.png",
    "https://tantto-assinaturas.s3.us-east-1.amazonaws.com/gennie-mock/frontal/4.png",
    "https://tantto-assinaturas.s3.us-east-1.amazonaws.com/gennie-mock/frontal/5.png",
    "https://tantto-assinaturas.s3.us-east-1.amazonaws.com/gennie-mock/frontal/6.png",
    "https://tantto-assinaturas.s3.us-east-1.amazonaws.com/gennie-mock/frontal/7.png",
    "https://tantto-assinaturas.s3.us-east-1.amazonaws.com/gennie-mock/frontal/8.png",
    "https://tantto-assinaturas.s3.us-east-1.amazonaws.com/gennie-mock/frontal/11.png",
    "https://tantto-assinaturas.s3.us-east-1.amazonaws.com/gennie-mock/frontal/14.png",
    "https://tantto-assinaturas.s3.us-east-1.amazonaws.com/gennie-mock/frontal/15.png",
    "https://tantto-assinaturas.s3.us-east-1.amazonaws.com/gennie-mock/frontal/18.png",
    "https://tantto-assinaturas.s3.us-east-1.amazonaws.com/gennie-mock/frontal/19.png",
    "https://tantto-assinaturas.s3.us-east-1.amazonaws.com/gennie-mock/frontal/20.png",
];

/// Session directory: `COLORACAO_SESSION_DIR`, else `~/.coloracao`.
pub fn session_dir(env: &dyn EnvSource) -> PathBuf {
    if let Some(dir) = env.get("COLORACAO_SESSION_DIR") {
        return PathBuf::from(dir);
    }
    match env.get("HOME") {
        Some(home) => PathBuf::from(home).join(".coloracao"),
        None => PathBuf::from(".coloracao"),
    }
}

pub fn credentials(env: &dyn EnvSource) -> Credentials {
    Credentials::new(
        env.get(Endpoint::Username.key()),
        env.get(Endpoint::Password.key()),
    )
}

fn status_printer() -> StatusCallback {
    Arc::new(|text: &str| eprintln!("  {text}"))
}

pub struct App<C: Clock, S: SessionStorage> {
    env: Arc<dyn EnvSource>,
    api: ApiClient,
    session: SessionStore<C, S>,
}

impl App<SystemClock, FileStorage> {
    /// Production wiring from the process environment.
    pub fn from_env(env: Arc<dyn EnvSource>) -> anyhow::Result<Self> {
        let config = ApiConfig::from_env(env.as_ref())?;
        let api = ApiClient::new(env.clone(), config);
        let dir = session_dir(env.as_ref());
        tracing::debug!(session_dir = %dir.display(), "Using session directory");
        let session = SessionStore::new(SystemClock, FileStorage::new(dir), credentials(env.as_ref()));
        Ok(Self::new(env, api, session))
    }
}

impl<C: Clock, S: SessionStorage> App<C, S> {
    pub fn new(env: Arc<dyn EnvSource>, api: ApiClient, session: SessionStore<C, S>) -> Self {
        Self { env, api, session }
    }

    pub fn session(&self) -> &SessionStore<C, S> {
        &self.session
    }

    /// Restore the session, apply the authentication gate and run `command`.
    pub async fn run<W: Write>(&mut self, command: Command, out: &mut W) -> anyhow::Result<()> {
        let outcome = self.session.restore()?;
        tracing::debug!(?outcome, "Session restored");

        if !command.is_public() {
            self.session.require_authenticated()?;
        }

        match command {
            Command::Login { username, password } => self.login(&username, &password, out)?,
            Command::Logout => {
                self.session.logout()?;
                writeln!(out, "Sessão encerrada.")?;
            }
            Command::Status => self.status(out)?,
            Command::CheckConfig => self.check_config(out)?,
            Command::Samples => {
                for (i, url) in SAMPLE_IMAGES.iter().enumerate() {
                    writeln!(out, "{:>2}. {url}", i + 1)?;
                }
            }
            Command::Upload { file, eye } => {
                let kind = if eye { UploadKind::Eye } else { UploadKind::Frontal };
                let url = self.upload(&ImageSource::File(file), kind).await?;
                writeln!(out, "URL: {url}")?;
            }
            Command::Analyze(args) => self.analyze(args, out).await?,
            Command::Classify(args) => self.classify(args, out).await?,
        }
        Ok(())
    }

    fn login<W: Write>(&mut self, username: &str, password: &str, out: &mut W) -> anyhow::Result<()> {
        if !self.session.login(username, password)? {
            bail!("Usuário ou senha incorretos");
        }
        writeln!(out, "Login realizado. A sessão vale por 24 horas.")?;
        Ok(())
    }

    fn status<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        let state = if self.session.is_authenticated() {
            "ativa"
        } else {
            "inativa"
        };
        writeln!(out, "Sessão: {state}")?;
        let report = validate_configuration(self.env.as_ref());
        if report.valid {
            writeln!(out, "Configuração: completa")?;
        } else {
            writeln!(out, "Configuração: incompleta ({} ausentes)", report.missing.len())?;
        }
        Ok(())
    }

    fn check_config<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        for endpoint in Endpoint::ALL {
            let shown = match (endpoint, self.env.get(endpoint.key())) {
                (_, None) if endpoint.required() => "AUSENTE".to_string(),
                (_, None) => "não definida (opcional)".to_string(),
                (Endpoint::Upload | Endpoint::ColoracaoSimplificado, Some(url)) => url,
                (_, Some(secret)) => mask(&secret),
            };
            writeln!(out, "{:<34} {shown}", endpoint.key())?;
        }

        let polling = &self.api.config().polling;
        writeln!(
            out,
            "Polling: até {} tentativas, {}s iniciais, máximo {}s",
            polling.max_attempts,
            polling.initial_delay.as_secs(),
            polling.max_delay.as_secs()
        )?;

        let report = validate_configuration(self.env.as_ref());
        if !report.valid {
            for missing in &report.missing {
                writeln!(out, "Ausente: {missing}")?;
            }
            bail!("Configuração incompleta");
        }
        writeln!(out, "Configuração válida.")?;
        Ok(())
    }

    async fn upload(&self, source: &ImageSource, kind: UploadKind) -> anyhow::Result<String> {
        let path = match source {
            ImageSource::Url(url) => return Ok(url.clone()),
            ImageSource::File(path) => path,
        };

        let file = UploadFile::from_path(path).await?;
        let uploads = UploadService::new(self.api.clone());
        let progress = Progress::new(move |p: u8| eprint!("\r  Enviando {}: {p}%", kind.as_str()));
        let response = uploads
            .upload_file(&file, kind, Some(progress), &CancellationToken::new())
            .await;
        eprintln!();
        let response = response?;
        tracing::info!(url = %response.url, key = %response.key, "Upload complete");
        Ok(response.url)
    }

    async fn analyze<W: Write>(&self, args: AnalyzeArgs, out: &mut W) -> anyhow::Result<()> {
        let service = ColoracaoService::new(self.api.clone());
        let status = Some(status_printer());

        let frontal_url = self.upload(&args.frontal, UploadKind::Frontal).await?;
        let eye_url = match &args.eye {
            Some(source) => Some(self.upload(source, UploadKind::Eye).await?),
            None => None,
        };

        let analysis = match eye_url {
            Some(eye_url) => {
                service
                    .analyze_both_images(&frontal_url, &eye_url, args.mode(), status.clone())
                    .await?
            }
            None => {
                let outcome = service
                    .analyze_image(&frontal_url, JobType::Extracao, status.clone())
                    .await?;
                CombinedAnalysisResult::single(outcome.result, outcome.beard_detected)
            }
        };
        let colors = analysis.classification_colors();

        writeln!(out, "{}", render::extraction_tab(&analysis))?;

        let mut files = Vec::new();
        if args.out.is_some() {
            files.extend(self.overlays(&analysis).await);
        }

        if args.classify {
            match &args.manual {
                Some(source) => {
                    let manual = ManualColorInput::from_color_map(&read_colors(source).await?)
                        .prepare_submission(analysis.beard_detected)?;
                    let (extracted, manual) = service
                        .classify_pair(colors, manual, status.clone())
                        .await?;
                    writeln!(out, "{}", render::classification_tab("Classificação (IA)", &extracted))?;
                    writeln!(out, "{}", render::classification_tab("Classificação (manual)", &manual))?;
                    files.push(report::chart_file("ia", &extracted));
                    files.push(report::chart_file("manual", &manual));
                }
                None => {
                    let response = service.classify_colors(colors, status).await?;
                    writeln!(out, "{}", render::classification_tab("Classificação", &response))?;
                    files.push(report::chart_file("ia", &response));
                }
            }
        }

        if let Some(dir) = &args.out {
            write_report(dir, &files, out).await?;
        }
        Ok(())
    }

    /// Overlay files for every shown region with geometry. Regions whose
    /// photo size cannot be read get no overlay.
    async fn overlays(&self, analysis: &CombinedAnalysisResult) -> Vec<ReportFile> {
        let mut sizes: Vec<(&str, Option<Size>)> = Vec::new();
        let mut files = Vec::new();
        for (region, url, coords) in analysis.overlay_regions() {
            let natural = match sizes.iter().find(|(seen, _)| *seen == url) {
                Some((_, size)) => *size,
                None => {
                    let size = self.natural_size(url).await;
                    sizes.push((url, size));
                    size
                }
            };
            let Some(natural) = natural else { continue };
            files.extend(report::overlay_file("regiao", region, url, coords, natural));
        }
        files
    }

    /// Pixel size of the photo at `url`, or `None` when it cannot be
    /// fetched within the request timeout or decoded.
    async fn natural_size(&self, url: &str) -> Option<Size> {
        if url.is_empty() {
            return None;
        }
        let request = Request::get(url).timeout(self.api.config().timeouts.default);
        let size = match self.api.send(request, &CancellationToken::new()).await {
            Ok(Reply::Image { bytes, .. }) => report::image_dimensions(&bytes),
            Ok(Reply::Json(_)) => None,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Could not fetch photo");
                None
            }
        };
        if size.is_none() {
            tracing::warn!(url = %url, "Photo size unknown, skipping its overlays");
        }
        size
    }

    async fn classify<W: Write>(&self, args: ClassifyArgs, out: &mut W) -> anyhow::Result<()> {
        let colors = ManualColorInput::from_color_map(&read_colors(&args.colors).await?)
            .prepare_submission(args.beard)?;
        let service = ColoracaoService::new(self.api.clone());
        let response = service.classify_colors(colors, Some(status_printer())).await?;
        writeln!(out, "{}", render::classification_tab("Classificação", &response))?;

        if let Some(dir) = &args.out {
            write_report(dir, &[report::chart_file("manual", &response)], out).await?;
        }
        Ok(())
    }
}

async fn read_colors(source: &ColorsSource) -> anyhow::Result<ColorMap> {
    let raw = match source {
        ColorsSource::Inline(json) => json.clone(),
        ColorsSource::File(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("ler {}", path.display()))?,
    };
    serde_json::from_str(&raw).context(r##"Cores inválidas: esperado um objeto JSON {"região": "#RRGGBB"}"##)
}

async fn write_report<W: Write>(dir: &std::path::Path, files: &[ReportFile], out: &mut W) -> anyhow::Result<()> {
    for path in report::write_files(dir, files).await? {
        writeln!(out, "Arquivo gerado: {}", path.display())?;
    }
    Ok(())
}
