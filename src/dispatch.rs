//! Batch-job dispatch boundary.
//!
//! The pipeline only constructs `JobRequest`s; everything scheduler-specific
//! lives behind `JobDispatcher`. The Slurm implementation renders a batch
//! script under the observation's batch directory and hands it to `sbatch`.
//! Submission is fire-and-forget: nothing here polls job status.
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

/// Resource requirements declared to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceProfile {
    /// Wall-time limit, `HH:MM:SS`.
    pub time_limit: String,
    pub memory_mb: Option<u32>,
}

impl ResourceProfile {
    pub fn with_time(time_limit: &str) -> Self {
        Self {
            time_limit: time_limit.to_string(),
            memory_mb: None,
        }
    }
}

/// Everything the scheduler needs to run one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRequest {
    pub name: String,
    /// Shell lines, executed sequentially; a failing line aborts the job, so
    /// the trailing self-relaunch only runs after the stage succeeded.
    pub commands: Vec<String>,
    pub batch_dir: PathBuf,
    pub resources: ResourceProfile,
    /// Environment modules loaded before the commands run.
    pub modules: Vec<String>,
    /// When false the script is written but not handed to the scheduler.
    pub must_submit: bool,
}

/// Handle returned by the scheduler.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub job_id: Option<String>,
    pub script_path: PathBuf,
}

pub trait JobDispatcher {
    fn submit(&self, request: &JobRequest) -> Result<JobHandle>;
}

/// Dispatcher backed by Slurm's `sbatch`.
pub struct SlurmDispatcher;

impl SlurmDispatcher {
    /// Render the batch script for a request.
    pub fn render_script(request: &JobRequest) -> String {
        let mut script = String::new();
        script.push_str("#!/bin/bash -l\n");
        script.push_str(&format!("#SBATCH --job-name={}\n", request.name));
        script.push_str(&format!(
            "#SBATCH --output={}/{}.out\n",
            request.batch_dir.display(),
            request.name
        ));
        script.push_str("#SBATCH --export=NONE\n");
        script.push_str(&format!("#SBATCH --time={}\n", request.resources.time_limit));
        if let Some(memory_mb) = request.resources.memory_mb {
            script.push_str(&format!("#SBATCH --mem={memory_mb}M\n"));
        }
        script.push('\n');
        for module in &request.modules {
            script.push_str(&format!("module load {module}\n"));
        }
        script.push('\n');
        for command in &request.commands {
            script.push_str(command);
            script.push('\n');
        }
        script
    }
}

impl JobDispatcher for SlurmDispatcher {
    fn submit(&self, request: &JobRequest) -> Result<JobHandle> {
        fs::create_dir_all(&request.batch_dir)
            .with_context(|| format!("create batch dir {}", request.batch_dir.display()))?;
        let script_path = request.batch_dir.join(format!("{}.batch", request.name));
        fs::write(&script_path, Self::render_script(request))
            .with_context(|| format!("write batch script {}", script_path.display()))?;

        if !request.must_submit {
            tracing::info!(script = %script_path.display(), "batch script written, submission skipped");
            return Ok(JobHandle {
                job_id: None,
                script_path,
            });
        }

        let sbatch = which::which("sbatch").context("locate sbatch on PATH")?;
        let output = Command::new(sbatch)
            .arg(&script_path)
            .output()
            .with_context(|| format!("run sbatch for {}", request.name))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "sbatch failed for {} with status {}: {}",
                request.name,
                output.status,
                stderr.trim()
            ));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let job_id = parse_job_id(&stdout);
        tracing::info!(
            job = %request.name,
            id = job_id.as_deref().unwrap_or("unknown"),
            "batch job submitted"
        );
        Ok(JobHandle {
            job_id,
            script_path,
        })
    }
}

/// Pull the job id out of `Submitted batch job 123456`.
fn parse_job_id(stdout: &str) -> Option<String> {
    stdout
        .split_whitespace()
        .last()
        .filter(|token| !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()))
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(batch_dir: PathBuf) -> JobRequest {
        JobRequest {
            name: "fold_rm_J2241-5236_1255444104".to_string(),
            commands: vec![
                "echo 'Running dspsr folding'".to_string(),
                "dspsr -cont in.fits".to_string(),
            ],
            batch_dir,
            resources: ResourceProfile::with_time("08:00:00"),
            modules: vec!["dspsr/master".to_string(), "psrchive/master".to_string()],
            must_submit: false,
        }
    }

    #[test]
    fn script_carries_headers_modules_and_commands_in_order() {
        let request = request(PathBuf::from("/data/vcs/1255444104/batch"));
        let script = SlurmDispatcher::render_script(&request);
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[0], "#!/bin/bash -l");
        assert!(lines.contains(&"#SBATCH --job-name=fold_rm_J2241-5236_1255444104"));
        assert!(lines.contains(&"#SBATCH --time=08:00:00"));
        let module_index = lines
            .iter()
            .position(|line| *line == "module load dspsr/master")
            .unwrap();
        let command_index = lines
            .iter()
            .position(|line| *line == "dspsr -cont in.fits")
            .unwrap();
        assert!(module_index < command_index);
    }

    #[test]
    fn memory_header_is_optional() {
        let mut req = request(PathBuf::from("/tmp/batch"));
        assert!(!SlurmDispatcher::render_script(&req).contains("--mem="));
        req.resources.memory_mb = Some(8192);
        assert!(SlurmDispatcher::render_script(&req).contains("#SBATCH --mem=8192M"));
    }

    #[test]
    fn unsubmitted_request_writes_the_script_only() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path().join("batch"));
        let handle = SlurmDispatcher.submit(&req).unwrap();
        assert!(handle.job_id.is_none());
        assert!(handle.script_path.is_file());
        let script = fs::read_to_string(&handle.script_path).unwrap();
        assert!(script.ends_with("dspsr -cont in.fits\n"));
    }

    #[test]
    fn job_id_is_parsed_from_sbatch_output() {
        assert_eq!(
            parse_job_id("Submitted batch job 123456\n"),
            Some("123456".to_string())
        );
        assert_eq!(parse_job_id("sbatch: error\n"), None);
    }
}
