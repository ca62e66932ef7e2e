//! Shell commands, name resolution and line parsing

use serde_json::Value;

use crate::erp::resolve_endpoint;

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub usage: &'static str,
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "get",
    aliases: &["g", "read", "fetch"],
    usage: "get <endpoint> [--no-cache]",
    description: "Read an endpoint (cache first)",
  },
  Command {
    name: "create",
    aliases: &["c", "post", "new"],
    usage: "create <endpoint> <json>",
    description: "POST a JSON payload",
  },
  Command {
    name: "update",
    aliases: &["u", "put"],
    usage: "update <endpoint> <json>",
    description: "PUT a JSON payload",
  },
  Command {
    name: "delete",
    aliases: &["d", "del", "rm", "remove"],
    usage: "delete <endpoint>",
    description: "DELETE an endpoint",
  },
  Command {
    name: "online",
    aliases: &["on"],
    usage: "online",
    description: "Signal that connectivity is back (replays the queue)",
  },
  Command {
    name: "offline",
    aliases: &["off"],
    usage: "offline",
    description: "Signal that connectivity is gone",
  },
  Command {
    name: "sync",
    aliases: &["s", "drain"],
    usage: "sync",
    description: "Replay queued operations now",
  },
  Command {
    name: "status",
    aliases: &["st", "stat"],
    usage: "status",
    description: "Show connectivity, cache and queue sizes",
  },
  Command {
    name: "queue",
    aliases: &["pending", "ls"],
    usage: "queue",
    description: "List queued operations",
  },
  Command {
    name: "clear",
    aliases: &["clear-cache", "cc"],
    usage: "clear",
    description: "Empty the response cache",
  },
  Command {
    name: "help",
    aliases: &["h", "?"],
    usage: "help",
    description: "Show this list",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    usage: "quit",
    description: "Leave the shell",
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// A parsed shell line
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
  Get { endpoint: String, use_cache: bool },
  Create { endpoint: String, payload: Value },
  Update { endpoint: String, payload: Value },
  Delete { endpoint: String },
  Online,
  Offline,
  Sync,
  Status,
  Queue,
  Clear,
  Help,
  Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
  #[error("unknown command '{0}' (try 'help')")]
  Unknown(String),

  #[error("'{name}' is ambiguous: {candidates}")]
  Ambiguous { name: String, candidates: String },

  #[error("usage: {0}")]
  Usage(&'static str),

  #[error("invalid JSON payload: {0}")]
  InvalidJson(String),
}

/// Resolve a typed command name.
///
/// Exact names and aliases win; otherwise a prefix must identify exactly one
/// command.
pub fn resolve(name: &str) -> Result<&'static Command, ParseError> {
  let suggestions = get_suggestions(name);
  let lower = name.to_lowercase();

  match suggestions.as_slice() {
    [] => Err(ParseError::Unknown(name.to_string())),
    [first, ..] if first.name == lower || first.aliases.contains(&lower.as_str()) => Ok(*first),
    [only] => Ok(*only),
    many => Err(ParseError::Ambiguous {
      name: name.to_string(),
      candidates: many.iter().map(|c| c.name).collect::<Vec<_>>().join(", "),
    }),
  }
}

/// Parse one shell line. Blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<ShellCommand>, ParseError> {
  let line = line.trim();
  if line.is_empty() {
    return Ok(None);
  }

  let (name, rest) = split_first(line);
  let command = resolve(name)?;

  let parsed = match command.name {
    "get" => {
      let mut use_cache = true;
      let mut endpoint = None;
      for token in rest.split_whitespace() {
        if token == "--no-cache" {
          use_cache = false;
        } else if endpoint.is_none() {
          endpoint = Some(resolve_endpoint(token));
        } else {
          return Err(ParseError::Usage(command.usage));
        }
      }
      ShellCommand::Get {
        endpoint: endpoint.ok_or(ParseError::Usage(command.usage))?,
        use_cache,
      }
    }
    "create" | "update" => {
      let (endpoint, payload) = split_first(rest);
      if endpoint.is_empty() || payload.is_empty() {
        return Err(ParseError::Usage(command.usage));
      }
      let endpoint = resolve_endpoint(endpoint);
      let payload = parse_payload(payload)?;
      if command.name == "create" {
        ShellCommand::Create { endpoint, payload }
      } else {
        ShellCommand::Update { endpoint, payload }
      }
    }
    "delete" => {
      let mut tokens = rest.split_whitespace();
      match (tokens.next(), tokens.next()) {
        (Some(endpoint), None) => ShellCommand::Delete {
          endpoint: resolve_endpoint(endpoint),
        },
        _ => return Err(ParseError::Usage(command.usage)),
      }
    }
    "online" => ShellCommand::Online,
    "offline" => ShellCommand::Offline,
    "sync" => ShellCommand::Sync,
    "status" => ShellCommand::Status,
    "queue" => ShellCommand::Queue,
    "clear" => ShellCommand::Clear,
    "help" => ShellCommand::Help,
    "quit" => ShellCommand::Quit,
    other => return Err(ParseError::Unknown(other.to_string())),
  };

  Ok(Some(parsed))
}

/// Parse a JSON payload argument.
pub fn parse_payload(text: &str) -> Result<Value, ParseError> {
  serde_json::from_str(text).map_err(|e| ParseError::InvalidJson(e.to_string()))
}

/// Split off the first whitespace-delimited word.
fn split_first(s: &str) -> (&str, &str) {
  let s = s.trim();
  match s.split_once(char::is_whitespace) {
    Some((head, rest)) => (head, rest.trim()),
    None => (s, ""),
  }
}

/// Help text listing every command
pub fn help_text() -> String {
  COMMANDS
    .iter()
    .map(|cmd| format!("  {:<28} {}", cmd.usage, cmd.description))
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("status");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "status");
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("q");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "quit");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("cre");
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].name, "create");
  }

  #[test]
  fn test_resolve_prefers_alias_over_prefix() {
    // "s" is an alias of sync and a prefix of status
    assert_eq!(resolve("s").unwrap().name, "sync");
  }

  #[test]
  fn test_resolve_ambiguous_prefix() {
    assert!(matches!(
      resolve("of"),
      Ok(Command { name: "offline", .. })
    ));
    assert!(matches!(resolve("o"), Err(ParseError::Ambiguous { .. })));
  }

  #[test]
  fn test_resolve_unknown() {
    assert_eq!(
      resolve("launch").unwrap_err(),
      ParseError::Unknown("launch".to_string())
    );
  }

  #[test]
  fn test_parse_blank_line() {
    assert_eq!(parse("   ").unwrap(), None);
  }

  #[test]
  fn test_parse_get_with_no_cache_flag() {
    assert_eq!(
      parse("get materials --no-cache").unwrap(),
      Some(ShellCommand::Get {
        endpoint: "/inventory/materials".to_string(),
        use_cache: false
      })
    );
    assert_eq!(
      parse("fetch /sales/orders").unwrap(),
      Some(ShellCommand::Get {
        endpoint: "/sales/orders".to_string(),
        use_cache: true
      })
    );
  }

  #[test]
  fn test_parse_get_requires_endpoint() {
    assert!(matches!(parse("get"), Err(ParseError::Usage(_))));
  }

  #[test]
  fn test_parse_create_keeps_spaces_in_payload() {
    assert_eq!(
      parse(r#"post /sales/orders {"customerId": "C1", "total": 100}"#).unwrap(),
      Some(ShellCommand::Create {
        endpoint: "/sales/orders".to_string(),
        payload: json!({"customerId": "C1", "total": 100})
      })
    );
  }

  #[test]
  fn test_parse_update_rejects_bad_json() {
    assert!(matches!(
      parse("update wo/WO-1 {status: done}"),
      Err(ParseError::InvalidJson(_))
    ));
  }

  #[test]
  fn test_parse_delete() {
    assert_eq!(
      parse("rm customers/C9").unwrap(),
      Some(ShellCommand::Delete {
        endpoint: "/sales/customers/C9".to_string()
      })
    );
    assert!(matches!(parse("delete"), Err(ParseError::Usage(_))));
  }

  #[test]
  fn test_parse_bare_commands() {
    assert_eq!(parse("on").unwrap(), Some(ShellCommand::Online));
    assert_eq!(parse("off").unwrap(), Some(ShellCommand::Offline));
    assert_eq!(parse("ls").unwrap(), Some(ShellCommand::Queue));
    assert_eq!(parse("exit").unwrap(), Some(ShellCommand::Quit));
  }

  #[test]
  fn test_every_command_in_table_parses() {
    for cmd in COMMANDS {
      let line = match cmd.name {
        "get" | "delete" => format!("{} /sales/orders", cmd.name),
        "create" | "update" => format!("{} /sales/orders {{}}", cmd.name),
        name => name.to_string(),
      };
      assert!(
        matches!(parse(&line), Ok(Some(_))),
        "{} did not parse",
        cmd.name
      );
    }
    assert_eq!(parse("quit").unwrap(), Some(ShellCommand::Quit));
  }

  #[test]
  fn test_help_lists_every_command() {
    let help = help_text();
    for cmd in COMMANDS {
      assert!(help.contains(cmd.usage));
    }
  }
}
