//! Minimal CLI parsing for the curator commands.

use std::env;

use crate::services::FieldEdit;

pub const USAGE: &str = "\
Usage:
  curator fetch <name>...
  curator rename-images [--exclude] [<name>...]
  curator field --action <add|delete> --key <key> [--value <value>] [--exclude] [<name>...]

Commands:
  fetch          Search the metadata provider and add or refresh entries
  rename-images  Renumber and convert an entry's supplementary images
  field          Add or delete a top-level key in entry records

Options:
  --exclude      Invert the name list: run over every entry except the named ones
  --action       Field operation, add or delete
  --key          Field name to edit
  --value        Field value (required for --action add)";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Fetch {
        names: Vec<String>,
    },
    RenameImages {
        names: Vec<String>,
        exclude: bool,
    },
    Field {
        edit: FieldEdit,
        names: Vec<String>,
        exclude: bool,
    },
}

impl Command {
    pub fn from_args() -> Result<Self, String> {
        parse(env::args().skip(1))
    }
}

pub fn parse(args: impl Iterator<Item = String>) -> Result<Command, String> {
    let mut args = args;
    let command = args.next().ok_or_else(|| "missing command".to_string())?;

    match command.as_str() {
        "fetch" => {
            let names: Vec<String> = args.collect();
            if names.is_empty() {
                return Err("fetch needs at least one name".to_string());
            }
            if let Some(flag) = names.iter().find(|n| n.starts_with("--")) {
                return Err(format!("fetch takes no flags, got '{flag}'"));
            }
            Ok(Command::Fetch { names })
        }
        "rename-images" => {
            let (names, exclude, leftovers) = split_target_args(args)?;
            if let Some((flag, _)) = leftovers.into_iter().next() {
                return Err(format!("unknown flag '{flag}' for rename-images"));
            }
            Ok(Command::RenameImages { names, exclude })
        }
        "field" => {
            let mut action = None;
            let mut key = None;
            let mut value = None;
            let (names, exclude, leftovers) = split_target_args(args)?;
            for (flag, flag_value) in leftovers {
                let slot = match flag.as_str() {
                    "--action" => &mut action,
                    "--key" => &mut key,
                    "--value" => &mut value,
                    _ => return Err(format!("unknown flag '{flag}' for field")),
                };
                *slot = Some(flag_value.ok_or_else(|| format!("{flag} needs a value"))?);
            }

            let key = key.ok_or_else(|| "field needs --key".to_string())?;
            let edit = match action.as_deref() {
                Some("add") => FieldEdit::Add {
                    key,
                    value: value.ok_or_else(|| "--action add needs --value".to_string())?,
                },
                Some("delete") => FieldEdit::Delete { key },
                Some(other) => return Err(format!("unknown action '{other}', use add or delete")),
                None => return Err("field needs --action".to_string()),
            };
            Ok(Command::Field { edit, names, exclude })
        }
        other => Err(format!("unknown command '{other}'")),
    }
}

/// Separates positional names from flags, resolving `--exclude` in place.
/// Other flags come back as `(name, value)` pairs for the caller to judge;
/// both `--flag value` and `--flag=value` spellings are accepted.
fn split_target_args(
    args: impl Iterator<Item = String>,
) -> Result<(Vec<String>, bool, Vec<(String, Option<String>)>), String> {
    let mut names = Vec::new();
    let mut exclude = false;
    let mut flags = Vec::new();

    let mut args = args.peekable();
    while let Some(arg) = args.next() {
        if arg == "--exclude" {
            exclude = true;
        } else if !arg.starts_with("--") {
            names.push(arg);
        } else if let Some((flag, value)) = arg.split_once('=') {
            flags.push((flag.to_string(), Some(value.to_string())));
        } else {
            let value = match args.peek() {
                Some(next) if !next.starts_with("--") => args.next(),
                _ => None,
            };
            flags.push((arg, value));
        }
    }

    Ok((names, exclude, flags))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_line(line: &str) -> Result<Command, String> {
        parse(line.split_whitespace().map(str::to_string))
    }

    #[test]
    fn test_fetch_collects_names() {
        let command = parse_line("fetch Severance Andor").unwrap();
        assert_eq!(
            command,
            Command::Fetch {
                names: vec!["Severance".to_string(), "Andor".to_string()],
            }
        );
    }

    #[test]
    fn test_fetch_without_names_is_an_error() {
        assert!(parse_line("fetch").is_err());
    }

    #[test]
    fn test_rename_images_without_names_means_everything() {
        let command = parse_line("rename-images").unwrap();
        assert_eq!(
            command,
            Command::RenameImages {
                names: vec![],
                exclude: false,
            }
        );
    }

    #[test]
    fn test_rename_images_exclude_flag() {
        let command = parse_line("rename-images --exclude Severance").unwrap();
        assert_eq!(
            command,
            Command::RenameImages {
                names: vec!["Severance".to_string()],
                exclude: true,
            }
        );
    }

    #[test]
    fn test_field_add_requires_value() {
        assert!(parse_line("field --action add --key favorite").is_err());

        let command = parse_line("field --action add --key favorite --value yes Show").unwrap();
        assert_eq!(
            command,
            Command::Field {
                edit: FieldEdit::Add {
                    key: "favorite".to_string(),
                    value: "yes".to_string(),
                },
                names: vec!["Show".to_string()],
                exclude: false,
            }
        );
    }

    #[test]
    fn test_field_delete_with_equals_spelling() {
        let command = parse_line("field --action=delete --key=watched --exclude Show").unwrap();
        assert_eq!(
            command,
            Command::Field {
                edit: FieldEdit::Delete {
                    key: "watched".to_string(),
                },
                names: vec!["Show".to_string()],
                exclude: true,
            }
        );
    }

    #[test]
    fn test_field_rejects_unknown_action() {
        assert!(parse_line("field --action rename --key x").is_err());
    }

    #[test]
    fn test_unknown_command_is_an_error() {
        assert!(parse_line("sync").is_err());
        assert!(parse_line("").is_err());
    }

    #[test]
    fn test_unknown_flag_is_an_error() {
        assert!(parse_line("rename-images --force").is_err());
        assert!(parse_line("fetch --exclude Show").is_err());
    }
}
