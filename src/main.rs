use clap::{Args, Parser, Subcommand};
use std::{fs, path::PathBuf};
use tracing_subscriber::EnvFilter;
use vershape::{DefinitionError, SourceError, VersionDefinition, VersionError, VersionSource};

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Definition(#[from] DefinitionError),

    #[error("{0}")]
    Version(#[from] VersionError),

    #[error("{0}")]
    Source(#[from] SourceError),

    #[error("Could not read definition file `{}`: {source}", path.display())]
    DefinitionFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Could not serialize values: {0}")]
    Output(#[from] serde_json::Error),
}

/// Where to get the version definition from.
#[derive(Args, Debug)]
struct DefinitionArg {
    /// A JSON definition document. Omit to use semantic versioning.
    #[arg(short, long, value_name = "FILE")]
    definition: Option<PathBuf>,
}

impl DefinitionArg {
    fn load(&self) -> Result<VersionDefinition, CliError> {
        match &self.definition {
            Some(path) => {
                let json = fs::read_to_string(path).map_err(|source| CliError::DefinitionFile {
                    path: path.clone(),
                    source,
                })?;
                Ok(VersionDefinition::from_json(&json)?)
            }
            None => Ok(VersionDefinition::semver()?),
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parses a version and prints its values as JSON
    Parse {
        /// The version string to parse
        version: String,

        #[command(flatten)]
        definition: DefinitionArg,
    },

    /// Validates that a version matches a definition. Exits with 1 if it does not.
    Valid {
        /// The version string to validate
        version: String,

        #[command(flatten)]
        definition: DefinitionArg,
    },

    /// Reads a base version from a file, appends build metadata, and prints it as an image tag.
    Tag {
        /// The file holding the base version
        #[arg(short, long, default_value = "VERSION")]
        file: PathBuf,

        /// The build metadata appended to the base version
        #[arg(short, long, env = "GIT_SHA", default_value = "LOCAL")]
        metadata: String,

        /// The base version used when the file does not exist
        #[arg(long, default_value = "0.0.0")]
        default_base: String,

        #[command(flatten)]
        definition: DefinitionArg,
    },
}

type Output = (String, i32);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match do_work(cli) {
        Ok((output, exit_code)) => {
            println!("{output}");
            std::process::exit(exit_code);
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn do_work(cli: Cli) -> Result<Output, CliError> {
    match cli.command {
        Commands::Parse {
            version,
            definition,
        } => {
            let version = definition.load()?.parse(&version)?;
            Ok((serde_json::to_string(version.values())?, 0))
        }
        Commands::Valid {
            version,
            definition,
        } => Ok(if definition.load()?.is_valid(&version) {
            ("true".to_string(), 0)
        } else {
            ("false".to_string(), 1)
        }),
        Commands::Tag {
            file,
            metadata,
            default_base,
            definition,
        } => {
            let source = VersionSource::new(metadata).with_default_base(default_base);
            let version = source.load(file, &definition.load()?)?;
            Ok((version.to_tag(), 0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str]) -> Result<Output, CliError> {
        let cli = Cli::try_parse_from(args).unwrap();
        do_work(cli)
    }

    #[test]
    fn test_parse_semver() {
        let (output, code) = run(&["vershape", "parse", "1.2.3-rc.1"]).unwrap();
        assert_eq!(0, code);
        assert_eq!(
            r#"{"major":1,"minor":2,"patch":3,"prerelease":["rc","1"]}"#,
            output
        );
    }

    #[test]
    fn test_parse_mismatch() {
        assert!(matches!(
            run(&["vershape", "parse", "1.2"]),
            Err(CliError::Version(VersionError::FormatMismatch { .. }))
        ));
    }

    #[test]
    fn test_valid() {
        assert_eq!(
            ("true".to_string(), 0),
            run(&["vershape", "valid", "1.2.3"]).unwrap()
        );
        assert_eq!(
            ("false".to_string(), 1),
            run(&["vershape", "valid", "1.2.x"]).unwrap()
        );
    }

    #[test]
    fn test_tag_with_missing_file() {
        let (output, code) = run(&[
            "vershape",
            "tag",
            "--file",
            "non/existing/path",
            "--metadata",
            "AB4D",
        ])
        .unwrap();
        assert_eq!(0, code);
        assert_eq!("0.0.0_ab4d", output);
    }

    #[test]
    fn test_missing_definition_file() {
        assert!(matches!(
            run(&["vershape", "valid", "1", "--definition", "non/existing.json"]),
            Err(CliError::DefinitionFile { .. })
        ));
    }
}
