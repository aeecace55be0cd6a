//! Batch construction: from a TOML batch file or from a list of inputs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use bf_core::{JobId, JobRequest};

#[derive(Debug, Deserialize)]
struct BatchFile {
    #[serde(default, rename = "job")]
    jobs: Vec<JobRequest>,
}

/// Parse a batch file's `[[job]]` tables into requests.
pub fn parse_batch(content: &str) -> Result<Vec<JobRequest>> {
    let batch: BatchFile = toml::from_str(content).context("Failed to parse batch")?;
    check_ids(&batch.jobs)?;
    Ok(batch.jobs)
}

/// Read and parse a batch file.
pub fn load_batch(path: &Path) -> Result<Vec<JobRequest>> {
    let content = std::fs::read_to_string(path)
        .map_err(bf_core::Error::from)
        .with_context(|| format!("Failed to read batch file: {:?}", path))?;
    parse_batch(&content).with_context(|| format!("Invalid batch file: {:?}", path))
}

/// One request per input, writing `<out_dir>/<stem>.<ext>`.
///
/// Ids are `<n>-<stem>` (1-based) so repeated stems stay distinct.
pub fn requests_for_inputs(
    inputs: &[PathBuf],
    out_dir: &Path,
    ext: &str,
    args: &[String],
    overwrite: bool,
) -> Vec<JobRequest> {
    inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            JobRequest {
                id: JobId::new(format!("{}-{stem}", i + 1)),
                source: input.clone(),
                destination: out_dir.join(format!("{stem}.{}", ext.trim_start_matches('.'))),
                args: args.to_vec(),
                overwrite,
            }
        })
        .collect()
}

fn check_ids(jobs: &[JobRequest]) -> Result<()> {
    let mut seen = HashSet::new();
    for job in jobs {
        if job.id.as_str().trim().is_empty() {
            anyhow::bail!(bf_core::Error::Validation(format!(
                "job for {:?} has an empty id",
                job.source
            )));
        }
        if !seen.insert(&job.id) {
            anyhow::bail!(bf_core::Error::Validation(format!(
                "duplicate job id '{}'",
                job.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_jobs_with_defaults() {
        let jobs = parse_batch(
            r#"
[[job]]
id = "intro"
source = "/media/intro.mov"
destination = "/out/intro.mp4"
args = ["-c:v", "libx264", "-crf", "20"]

[[job]]
id = "outro"
source = "/media/outro.mov"
destination = "/out/outro.mp4"
overwrite = true
"#,
        )
        .unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, JobId::from("intro"));
        assert_eq!(jobs[0].args.len(), 4);
        assert!(!jobs[0].overwrite);
        assert!(jobs[1].args.is_empty());
        assert!(jobs[1].overwrite);
    }

    #[test]
    fn empty_batch_is_allowed() {
        assert!(parse_batch("").unwrap().is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = parse_batch(
            r#"
[[job]]
id = "a"
source = "x.mov"
destination = "x.mp4"

[[job]]
id = "a"
source = "y.mov"
destination = "y.mp4"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate job id 'a'"));
    }

    #[test]
    fn blank_id_is_rejected() {
        let err = parse_batch("[[job]]\nid = \" \"\nsource = \"x.mov\"\ndestination = \"x.mp4\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("empty id"));
    }

    #[test]
    fn inputs_become_numbered_requests() {
        let inputs = vec![PathBuf::from("/media/a.mov"), PathBuf::from("/other/a.mkv")];
        let args = vec!["-an".to_string()];
        let requests = requests_for_inputs(&inputs, Path::new("/out"), ".mp4", &args, false);

        assert_eq!(requests[0].id, JobId::from("1-a"));
        assert_eq!(requests[1].id, JobId::from("2-a"));
        assert_eq!(requests[0].destination, PathBuf::from("/out/a.mp4"));
        assert_eq!(requests[1].source, PathBuf::from("/other/a.mkv"));
        assert_eq!(requests[1].args, args);
    }
}
