//! Host script: one command per line, `#` starts a comment.
//!
//! ```text
//! navigate /micro
//! host-send hello
//! guest-send micro-app hi there
//! view micro-app
//! state
//! status
//! ```

use microhost_core::error::CliError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCommand {
    Navigate(String),
    HostSend(String),
    GuestSend { app: String, text: String },
    View(String),
    State,
    Status,
}

/// Parse a single line. Blank lines and comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ScriptCommand>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let cmd = match verb {
        "navigate" => {
            if !rest.starts_with('/') {
                return Err(format!("navigate expects an absolute path, got {rest:?}"));
            }
            ScriptCommand::Navigate(rest.to_string())
        }
        "host-send" => ScriptCommand::HostSend(rest.to_string()),
        "guest-send" => {
            let (app, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            if app.is_empty() {
                return Err("guest-send expects an app name".to_string());
            }
            ScriptCommand::GuestSend {
                app: app.to_string(),
                text: text.trim().to_string(),
            }
        }
        "view" => {
            if rest.is_empty() {
                return Err("view expects an app name".to_string());
            }
            ScriptCommand::View(rest.to_string())
        }
        "state" => ScriptCommand::State,
        "status" => ScriptCommand::Status,
        other => return Err(format!("unknown command {other:?}")),
    };
    Ok(Some(cmd))
}

pub fn parse_script(src: &str) -> Result<Vec<ScriptCommand>, CliError> {
    let mut out = Vec::new();
    for (idx, raw_line) in src.lines().enumerate() {
        match parse_line(raw_line) {
            Ok(Some(cmd)) => out.push(cmd),
            Ok(None) => {}
            Err(e) => {
                return Err(CliError::Script(format!("line {}: {}", idx + 1, e)));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_script() {
        let src = "\n# comment\nnavigate /micro\nhost-send  hello there \nguest-send micro-app hi host\nview micro-app\nstate\nstatus\n";
        assert_eq!(
            parse_script(src).unwrap(),
            vec![
                ScriptCommand::Navigate("/micro".into()),
                ScriptCommand::HostSend("hello there".into()),
                ScriptCommand::GuestSend {
                    app: "micro-app".into(),
                    text: "hi host".into(),
                },
                ScriptCommand::View("micro-app".into()),
                ScriptCommand::State,
                ScriptCommand::Status,
            ]
        );
    }

    #[test]
    fn test_empty_send_is_parsed() {
        // validation of the message itself is the panel's job
        assert_eq!(
            parse_line("host-send").unwrap(),
            Some(ScriptCommand::HostSend(String::new()))
        );
        assert_eq!(
            parse_line("guest-send micro-app").unwrap(),
            Some(ScriptCommand::GuestSend {
                app: "micro-app".into(),
                text: String::new(),
            })
        );
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse_script("state\nnavigate micro\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));

        assert!(parse_line("launch rockets").is_err());
        assert!(parse_line("guest-send").is_err());
        assert!(parse_line("view").is_err());
    }
}
