use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "uniformctl",
    author,
    version,
    about = "Inspect per-instance uniform layouts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a schema manifest and print the packed layout.
    Layout(LayoutArgs),
    /// Allocate texture-backed storage on a headless GPU adapter and upload it once.
    Upload(UploadArgs),
}

#[derive(Parser, Debug)]
pub struct LayoutArgs {
    /// Schema manifest (TOML with a `[uniforms]` table).
    #[arg(value_name = "SCHEMA")]
    pub schema: PathBuf,

    /// Instance capacity used to size the texture; overrides the manifest.
    #[arg(long, value_name = "INSTANCES", env = "UNIFORMCTL_CAPACITY")]
    pub capacity: Option<usize>,

    /// Emit the layout as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct UploadArgs {
    /// Schema manifest (TOML with a `[uniforms]` table).
    #[arg(value_name = "SCHEMA")]
    pub schema: PathBuf,

    /// Instance capacity used to size the texture; overrides the manifest.
    #[arg(long, value_name = "INSTANCES", env = "UNIFORMCTL_CAPACITY")]
    pub capacity: Option<usize>,

    /// Prefer a software adapter when available.
    #[arg(long)]
    pub fallback_adapter: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_layout_command() {
        let cli = Cli::try_parse_from(["uniformctl", "layout", "schema.toml", "--json"]).unwrap();
        match cli.command {
            Command::Layout(args) => {
                assert_eq!(args.schema, PathBuf::from("schema.toml"));
                assert!(args.json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn requires_schema_path() {
        assert!(Cli::try_parse_from(["uniformctl", "upload"]).is_err());
    }
}
