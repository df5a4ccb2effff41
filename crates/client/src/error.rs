use std::time::Duration;

/// Errors from the API client and the job workflows.
///
/// Display strings are the messages shown to the end user.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A required endpoint URL is missing from the environment.
    #[error("API endpoint {0} is not configured")]
    Config(String),

    /// A tuning variable is present but unparseable.
    #[error("Invalid value for {key}: {value}")]
    InvalidSetting { key: String, value: String },

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("Falha de rede: {0}")]
    Transport(String),

    /// The per-request timeout elapsed.
    #[error("Tempo limite da requisição excedido")]
    RequestTimeout,

    /// Non-2xx reply. `message` is the server's `error` field when it sent
    /// one, otherwise `HTTP <status>: <reason>`.
    #[error("{message}")]
    Http {
        status: u16,
        reason: String,
        message: String,
    },

    /// A 2xx reply that carried an `error` field.
    #[error("{0}")]
    Server(String),

    /// The body could not be decoded.
    #[error("Failed to parse response as JSON: {0}")]
    Decode(String),

    /// None of the known reply shapes matched.
    #[error("Resposta inesperada do servidor. Dados recebidos: {0}")]
    UnexpectedResponse(String),

    #[error("{prefix}: {details}")]
    JobFailed { prefix: String, details: String },

    #[error("Processamento foi cancelado")]
    JobCancelled,

    #[error("Status desconhecido: {0}")]
    UnknownStatus(String),

    /// Poll attempts exhausted without a terminal status.
    #[error("{0}")]
    TimedOut(String),

    /// The request or sleep was abandoned because its token was cancelled.
    #[error("Operação cancelada")]
    Aborted,

    /// The workflow deadline fired and in-flight work was abandoned.
    #[error("Tempo limite atingido ({}). Tente novamente mais tarde.", describe_duration(.0))]
    DeadlineExceeded(Duration),
}

/// `3 minutos`, `1 minuto`, `45 segundos`, `250 ms`.
pub fn describe_duration(duration: &Duration) -> String {
    let secs = duration.as_secs();
    if duration.subsec_millis() != 0 || secs == 0 {
        return format!("{} ms", duration.as_millis());
    }
    match (secs % 60, secs / 60) {
        (0, 1) => "1 minuto".to_string(),
        (0, minutes) => format!("{minutes} minutos"),
        _ if secs == 1 => "1 segundo".to_string(),
        _ => format!("{secs} segundos"),
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::RequestTimeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors from file validation and upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Apenas arquivos de imagem são permitidos")]
    NotAnImage,

    #[error("Arquivo muito grande. Máximo 10MB permitido")]
    TooLarge,

    #[error("Formato não suportado. Use JPEG, PNG ou WebP")]
    UnsupportedFormat,

    #[error("Upload não está configurado. Configure VITE_N8N_UPLOAD_URL nas variáveis de ambiente.")]
    NotConfigured,

    #[error("Erro na preparação do upload: {0}")]
    Read(#[from] std::io::Error),

    #[error("Erro no upload: {status} {reason}")]
    Http { status: u16, reason: String },

    #[error("Erro de rede durante o upload: {0}")]
    Network(String),

    #[error("Timeout no upload")]
    Timeout,

    #[error("Erro ao processar resposta do servidor")]
    InvalidResponse,

    #[error("Tempo limite atingido ao aguardar a URL da imagem")]
    UrlNotReady,

    #[error("Upload cancelado")]
    Cancelled,
}

impl From<ClientError> for UploadError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Config(_) => Self::NotConfigured,
            ClientError::RequestTimeout => Self::Timeout,
            ClientError::Http { status, reason, .. } => Self::Http { status, reason },
            ClientError::Aborted | ClientError::DeadlineExceeded(_) => Self::Cancelled,
            ClientError::Decode(_) | ClientError::UnexpectedResponse(_) => Self::InvalidResponse,
            other => Self::Network(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_message_follows_the_configured_duration() {
        assert_eq!(
            ClientError::DeadlineExceeded(Duration::from_secs(180)).to_string(),
            "Tempo limite atingido (3 minutos). Tente novamente mais tarde."
        );
        assert_eq!(describe_duration(&Duration::from_secs(60)), "1 minuto");
        assert_eq!(describe_duration(&Duration::from_secs(90)), "90 segundos");
        assert_eq!(describe_duration(&Duration::from_secs(1)), "1 segundo");
        assert_eq!(describe_duration(&Duration::from_millis(50)), "50 ms");
    }
}
