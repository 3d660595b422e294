use anyhow::{Context, Result};
use db::repositories::JobRepository;
use queue_core::{Config, Job, JobSpec};

use crate::cli::EnqueueArgs;

/// Build the job described by the command line, without touching the store.
pub fn build_job(config: &Config, args: &EnqueueArgs) -> Result<Job> {
    let spec = match (&args.json, &args.file) {
        (Some(raw), _) => JobSpec::from_json(raw).context("invalid --json payload")?,
        (None, Some(path)) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            JobSpec::from_json(&raw)
                .with_context(|| format!("invalid job file {}", path.display()))?
        }
        (None, None) => JobSpec::default(),
    };

    let max_retries = args.max_retries.unwrap_or(config.max_retries);
    let job = spec.into_job(args.command.as_deref().unwrap_or_default(), max_retries)?;
    Ok(job)
}

pub async fn run(config: &Config, args: EnqueueArgs) -> Result<()> {
    let job = build_job(config, &args)?;

    super::connect(config).await?;
    let job = JobRepository::enqueue(&job).await?;

    tracing::info!(
        job_id = %job.id,
        max_retries = job.max_retries,
        "Enqueued job: {}",
        job.command
    );
    println!("{}", job.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: Option<&str>, json: Option<&str>, max_retries: Option<u32>) -> EnqueueArgs {
        EnqueueArgs {
            command: command.map(str::to_string),
            json: json.map(str::to_string),
            file: None,
            max_retries,
        }
    }

    #[test]
    fn uses_configured_default_retries() {
        let config = Config {
            max_retries: 5,
            ..Config::default()
        };
        let job = build_job(&config, &args(Some("echo hi"), None, None)).unwrap();
        assert_eq!(job.command, "echo hi");
        assert_eq!(job.max_retries, 5);

        let job = build_job(&config, &args(Some("echo hi"), None, Some(1))).unwrap();
        assert_eq!(job.max_retries, 1);
    }

    #[test]
    fn json_fields_win() {
        let job = build_job(
            &Config::default(),
            &args(
                Some("echo positional"),
                Some(r#"{"id":"job-7","command":"echo json","max_retries":9}"#),
                Some(2),
            ),
        )
        .unwrap();
        assert_eq!(job.id.as_str(), "job-7");
        assert_eq!(job.command, "echo json");
        assert_eq!(job.max_retries, 9);
    }

    #[test]
    fn rejects_bad_input() {
        let config = Config::default();
        assert!(build_job(&config, &args(Some("echo"), Some("{not json"), None)).is_err());
        assert!(build_job(&config, &args(Some("echo"), Some("[1]"), None)).is_err());
        assert!(build_job(&config, &args(None, None, None)).is_err());
        assert!(build_job(&config, &args(None, Some(r#"{"id":"x"}"#), None)).is_err());
    }

    #[test]
    fn reads_job_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(&path, r#"{"command":"echo from file"}"#).unwrap();

        let mut args = args(None, None, None);
        args.file = Some(path);
        let job = build_job(&Config::default(), &args).unwrap();
        assert_eq!(job.command, "echo from file");

        args.file = Some(dir.path().join("missing.json"));
        assert!(build_job(&Config::default(), &args).is_err());
    }
}
