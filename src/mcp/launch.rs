//! 服务器路径 -> 启动命令
//!
//! `.py` 用配置的 Python 解释器启动（强制 UTF-8、无缓冲输出），`.js` 用 node，其余直接执行。
//! 带扩展名或路径分隔符的路径在启动前检查文件是否存在；裸命令名交给 PATH 解析。

use std::path::{Path, PathBuf};

use rmcp::transport::ConfigureCommandExt;
use tokio::process::Command;

use crate::core::SessionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLaunch {
    Python { interpreter: String, script: PathBuf },
    Node { script: PathBuf },
    Executable { program: PathBuf },
}

impl ServerLaunch {
    pub fn resolve(server_path: &str, python: &str) -> Result<Self, SessionError> {
        let trimmed = server_path.trim();
        if trimmed.is_empty() {
            return Err(SessionError::Connection("server path is empty".to_string()));
        }
        let path = PathBuf::from(trimmed);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let looks_like_file = extension.is_some() || trimmed.contains(std::path::MAIN_SEPARATOR) || trimmed.contains('/');
        if looks_like_file && !path.is_file() {
            return Err(SessionError::Connection(format!(
                "server file not found: {}",
                path.display()
            )));
        }

        Ok(match extension.as_deref() {
            Some("py") => ServerLaunch::Python {
                interpreter: python.to_string(),
                script: path,
            },
            Some("js") | Some("mjs") => ServerLaunch::Node { script: path },
            _ => ServerLaunch::Executable { program: path },
        })
    }

    /// 子进程命令（stdin/stdout 由传输层接管）
    pub fn command(&self) -> Command {
        match self {
            ServerLaunch::Python { interpreter, script } => Command::new(interpreter).configure(|cmd| {
                cmd.arg(script)
                    .env("PYTHONIOENCODING", "utf-8")
                    .env("PYTHONUNBUFFERED", "1");
            }),
            ServerLaunch::Node { script } => Command::new("node").configure(|cmd| {
                cmd.arg(script);
            }),
            ServerLaunch::Executable { program } => Command::new(program),
        }
    }

    /// 用于日志与错误信息的简短标签
    pub fn label(&self) -> String {
        let path: &Path = match self {
            ServerLaunch::Python { script, .. } | ServerLaunch::Node { script } => script,
            ServerLaunch::Executable { program } => program,
        };
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_python_script_uses_interpreter_and_utf8_env() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("math_server.py");
        std::fs::write(&script, "print('hi')").unwrap();

        let launch = ServerLaunch::resolve(script.to_str().unwrap(), "python3").unwrap();
        assert!(matches!(&launch, ServerLaunch::Python { interpreter, .. } if interpreter == "python3"));
        assert_eq!(launch.label(), "math_server.py");

        let cmd = launch.command();
        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), OsStr::new("python3"));
        let envs: Vec<_> = std_cmd.get_envs().collect();
        assert!(envs.contains(&(OsStr::new("PYTHONIOENCODING"), Some(OsStr::new("utf-8")))));
        assert!(envs.contains(&(OsStr::new("PYTHONUNBUFFERED"), Some(OsStr::new("1")))));
    }

    #[test]
    fn test_missing_file_is_connection_error() {
        let err = ServerLaunch::resolve("/definitely/not/here/server.py", "python").unwrap_err();
        assert!(matches!(err, SessionError::Connection(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_bare_command_is_executable() {
        let launch = ServerLaunch::resolve("nomu-math", "python").unwrap();
        assert_eq!(
            launch,
            ServerLaunch::Executable {
                program: PathBuf::from("nomu-math")
            }
        );
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(ServerLaunch::resolve("   ", "python").is_err());
    }
}
