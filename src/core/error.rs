use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,
    ValidationUnknownArgument,

    CommandDuplicate,

    ManifestInvalid,
    PackageHeaderInvalid,

    ToolInvocationFailed,
    ToolchainNotFound,
    NetworkFetchFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",
            ErrorCode::ValidationUnknownArgument => "validation.unknown_argument",

            ErrorCode::CommandDuplicate => "command.duplicate",

            ErrorCode::ManifestInvalid => "manifest.invalid",
            ErrorCode::PackageHeaderInvalid => "package.header_invalid",

            ErrorCode::ToolInvocationFailed => "tool.invocation_failed",
            ErrorCode::ToolchainNotFound => "toolchain.not_found",
            ErrorCode::NetworkFetchFailed => "network.fetch_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownArgumentDetails {
    pub command: String,
    pub argument: String,
    pub accepted: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestInvalidDetails {
    pub path: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

/// Failure of an external program. `exit_code` is -1 when the process could
/// not be spawned or was terminated by a signal.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocationFailedDetails {
    pub command: String,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolchainNotFoundDetails {
    pub tried: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkFetchFailedDetails {
    pub url: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn unknown_argument(
        command: impl Into<String>,
        argument: impl Into<String>,
        accepted: Vec<String>,
    ) -> Self {
        let command = command.into();
        let argument = argument.into();
        let message = format!("Unknown argument '{}' for command '{}'", argument, command);
        let hint = if accepted.is_empty() {
            format!("'{}' takes no arguments", command)
        } else {
            format!("'{}' accepts: {}", command, accepted.join(", "))
        };

        Self::new(
            ErrorCode::ValidationUnknownArgument,
            message,
            to_details(UnknownArgumentDetails {
                command,
                argument,
                accepted,
            }),
        )
        .with_hint(hint)
    }

    pub fn command_duplicate(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            ErrorCode::CommandDuplicate,
            format!("Command '{}' is already registered", name),
            serde_json::json!({ "name": name }),
        )
    }

    pub fn manifest_invalid(
        path: impl Into<String>,
        problem: impl Into<String>,
        line: Option<usize>,
    ) -> Self {
        Self::new(
            ErrorCode::ManifestInvalid,
            "Invalid patch manifest",
            to_details(ManifestInvalidDetails {
                path: path.into(),
                problem: problem.into(),
                line,
            }),
        )
    }

    pub fn package_header_invalid(path: impl Into<String>, problem: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::PackageHeaderInvalid,
            "Cannot derive runtime directory from version header",
            serde_json::json!({ "path": path.into(), "problem": problem.into() }),
        )
    }

    pub fn tool_invocation_failed(details: ToolInvocationFailedDetails) -> Self {
        let message = format!(
            "'{}' failed with exit code {}",
            details.command, details.exit_code
        );
        Self::new(ErrorCode::ToolInvocationFailed, message, to_details(details))
    }

    pub fn toolchain_not_found(tried: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ToolchainNotFound,
            "Cannot find a build environment initializer",
            to_details(ToolchainNotFoundDetails { tried }),
        )
        .with_hint("Set toolchain.initializer in vimbuild.json to the path of vcvarsall.bat")
    }

    pub fn network_fetch_failed(
        url: impl Into<String>,
        error: impl Into<String>,
        status: Option<u16>,
    ) -> Self {
        let mut err = Self::new(
            ErrorCode::NetworkFetchFailed,
            "Network fetch failed",
            to_details(NetworkFetchFailedDetails {
                url: url.into(),
                error: error.into(),
                status,
            }),
        );
        err.retryable = Some(true);
        err
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            to_details(ConfigInvalidJsonDetails {
                path: path.into(),
                error: err.to_string(),
            }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            to_details(ConfigInvalidValueDetails {
                key: key.into(),
                value,
                problem: problem.into(),
            }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            to_details(InternalIoErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            to_details(InternalJsonErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Exit code reported by the failing external tool, if this error came from one.
    pub fn tool_exit_code(&self) -> Option<i32> {
        if self.code != ErrorCode::ToolInvocationFailed {
            return None;
        }
        self.details
            .get("exitCode")
            .and_then(Value::as_i64)
            .map(|code| code as i32)
    }
}
