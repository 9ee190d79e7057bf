//! PRNU comparison CLI.
//!
//! `prnu <REF_DIR> <TEST_IMAGE>` builds a reference fingerprint and scores the
//! test image against it; `prnu <IMAGE_A> <IMAGE_B>` compares two images
//! directly.

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, ValueEnum};
use log::{error, info};

use prnu_forensics::{
    PipelineConfig, PrnuPipeline,
    error::{PrnuError, Result},
    logger,
    report::ComparisonReport,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Profile {
    /// Camera unavailable: 15+ references, extension check, custody hashes
    Strict,
    /// References shot on the camera under test: 10+ references
    CameraAvailable,
}

#[derive(Debug, Parser)]
#[command(name = "prnu", version, about = "Sensor-noise (PRNU) fingerprint comparison")]
struct Cli {
    /// Reference folder, or the first image of a direct comparison
    first: PathBuf,

    /// Test image, or the second image of a direct comparison
    second: PathBuf,

    #[arg(long, value_enum, default_value_t = Profile::Strict)]
    profile: Profile,

    /// TOML file overriding the profile defaults
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    min_references: Option<usize>,

    /// RAW container extension of reference files
    #[arg(long)]
    extension: Option<String>,

    #[arg(long)]
    no_extension_check: bool,

    #[arg(long)]
    no_custody_log: bool,

    /// Warn about edited or mixed-camera references using EXIF
    #[arg(long)]
    inspect_metadata: bool,

    /// Decode references one at a time
    #[arg(long)]
    sequential: bool,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Also write a JSON report here
    #[arg(long)]
    json: Option<PathBuf>,

    /// Skip writing the comparison PNG
    #[arg(long)]
    no_render: bool,
}

impl Cli {
    fn is_direct(&self) -> bool {
        !self.first.is_dir()
    }

    /// Profile first, then the TOML overlay, then individual flags. Direct
    /// mode always ends up with the direct-compare policy and prefix.
    fn resolve_config(&self) -> Result<PipelineConfig> {
        let mut config = match self.profile {
            Profile::Strict => PipelineConfig::strict(),
            Profile::CameraAvailable => PipelineConfig::camera_available(),
        };
        if let Some(ref path) = self.config {
            config = config.merge_file(path)?;
        }
        if self.is_direct() {
            config = config.into_direct_compare();
        }

        if let Some(count) = self.min_references {
            config = config.with_minimum_reference_count(count);
        }
        if let Some(ref extension) = self.extension {
            config = config.with_reference_extension(extension);
        }
        if self.no_extension_check {
            config.require_extension_check = false;
        }
        if self.no_custody_log {
            config.log_chain_of_custody = false;
        }
        if self.inspect_metadata {
            config.inspect_metadata = true;
        }
        if self.sequential {
            config = config.with_parallel(false);
        }
        if let Some(ref dir) = self.output_dir {
            config = config.with_output_dir(dir);
        }

        config.validate()?;
        Ok(config)
    }
}

fn run(cli: &Cli) -> Result<ComparisonReport> {
    let config = cli.resolve_config()?;
    let mut pipeline = PrnuPipeline::new(config)?;
    if cli.no_render {
        pipeline = pipeline.without_renderer();
    }

    let report = if cli.is_direct() {
        info!(
            "Direct comparison: {} vs {}",
            cli.first.display(),
            cli.second.display()
        );
        pipeline.compare_files(&cli.first, &cli.second)?
    } else {
        info!("Building reference fingerprint from {}", cli.first.display());
        let reference = pipeline.build_fingerprint_from_dir(&cli.first)?;
        pipeline.compare_to_fingerprint(&cli.second, &reference)?
    };

    if let Some(ref path) = cli.json {
        std::fs::write(path, report.to_json()?)?;
        info!("[+] Report written: {}", path.display());
    }

    Ok(report)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init();

    match run(&cli) {
        Ok(report) => {
            println!("{}", score_line(report.score.correlation));
            if let Some(ref path) = report.visualization {
                println!("[+] Visualization: {}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", failure_line(&e));
            ExitCode::FAILURE
        }
    }
}

fn score_line(correlation: f64) -> String {
    format!("[+] Normalized correlation score: {:.4}", correlation)
}

fn failure_line(error: &PrnuError) -> String {
    format!("[-] Error: {}", error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use prnu_forensics::error::PolicyViolation;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("prnu").chain(args.iter().copied())).unwrap()
    }

    struct Workspace {
        dir: tempfile::TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir(dir.path().join("refs")).unwrap();
            std::fs::write(dir.path().join("a.CR2"), b"a").unwrap();
            std::fs::write(dir.path().join("b.CR2"), b"b").unwrap();
            std::fs::write(
                dir.path().join("sigma.toml"),
                "[residual]\nsigma = 1.5\n",
            )
            .unwrap();
            Self { dir }
        }

        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).display().to_string()
        }
    }

    #[test]
    fn test_directory_first_argument_selects_fingerprint_mode() {
        let ws = Workspace::new();
        let cli = parse(&[&ws.path("refs"), &ws.path("a.CR2")]);
        assert!(!cli.is_direct());

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.minimum_reference_count, 15);
        assert!(config.require_extension_check);
        assert!(config.log_chain_of_custody);
        assert_eq!(config.report_prefix, "PRNU_strict_");
    }

    #[test]
    fn test_file_first_argument_selects_direct_mode() {
        let ws = Workspace::new();
        let cli = parse(&[&ws.path("a.CR2"), &ws.path("b.CR2")]);
        assert!(cli.is_direct());

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.minimum_reference_count, 0);
        assert_eq!(config.report_prefix, "PRNU_compare_");
    }

    #[test]
    fn test_config_file_layers_over_selected_profile() {
        let ws = Workspace::new();
        let cli = parse(&[
            &ws.path("refs"),
            &ws.path("a.CR2"),
            "--profile",
            "camera-available",
            "--config",
            &ws.path("sigma.toml"),
        ]);

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.minimum_reference_count, 10);
        assert!(!config.require_extension_check);
        assert!(!config.log_chain_of_custody);
        assert_eq!(config.report_prefix, "PRNU_test_");
        assert_eq!(config.residual.sigma, 1.5);
    }

    #[test]
    fn test_direct_mode_keeps_compare_prefix_with_config_file() {
        let ws = Workspace::new();
        let cli = parse(&[
            &ws.path("a.CR2"),
            &ws.path("b.CR2"),
            "--config",
            &ws.path("sigma.toml"),
        ]);

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.report_prefix, "PRNU_compare_");
        assert_eq!(config.minimum_reference_count, 0);
        assert_eq!(config.residual.sigma, 1.5);
    }

    #[test]
    fn test_flags_override_profile_and_config() {
        let ws = Workspace::new();
        let cli = parse(&[
            &ws.path("refs"),
            &ws.path("a.CR2"),
            "--config",
            &ws.path("sigma.toml"),
            "--min-references",
            "20",
            "--extension",
            ".nef",
            "--no-extension-check",
            "--no-custody-log",
            "--inspect-metadata",
            "--sequential",
            "--output-dir",
            &ws.path("out"),
        ]);

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.minimum_reference_count, 20);
        assert_eq!(config.extension(), "nef");
        assert!(!config.require_extension_check);
        assert!(!config.log_chain_of_custody);
        assert!(config.inspect_metadata);
        assert!(!config.parallel);
        assert_eq!(config.visualization.output_dir, ws.dir.path().join("out"));
        assert_eq!(config.residual.sigma, 1.5);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let ws = Workspace::new();
        let cli = parse(&[
            &ws.path("refs"),
            &ws.path("a.CR2"),
            "--config",
            &ws.path("absent.toml"),
        ]);
        assert!(matches!(cli.resolve_config(), Err(PrnuError::Config(_))));
    }

    #[test]
    fn test_wrong_argument_count_is_usage_error() {
        let err = Cli::try_parse_from(["prnu", "only-one"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_ne!(err.exit_code(), 0);

        let err = Cli::try_parse_from(["prnu", "a", "b", "c"]).unwrap_err();
        assert_ne!(err.exit_code(), 0);

        assert!(Cli::try_parse_from(["prnu"]).is_err());
    }

    #[test]
    fn test_score_line_has_four_decimals() {
        assert_eq!(score_line(0.123456), "[+] Normalized correlation score: 0.1235");
        assert_eq!(score_line(1.0), "[+] Normalized correlation score: 1.0000");
        assert_eq!(score_line(-0.00004), "[+] Normalized correlation score: -0.0000");
    }

    #[test]
    fn test_failure_line_describes_error() {
        let error = PrnuError::Policy(PolicyViolation::InsufficientReferences {
            found: 3,
            required: 15,
            extension: "CR2".into(),
        });
        assert_eq!(
            failure_line(&error),
            "[-] Error: Reference policy violation: Insufficient reference files: \
             found 3, need at least 15 CR2 images"
        );
    }
}
