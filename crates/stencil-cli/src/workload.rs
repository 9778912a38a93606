//! Per-file search and replace jobs.
//!
//! Files are grouped by language so that each pattern is compiled once,
//! then processed in parallel. Every worker owns its own parser and matcher;
//! compiled patterns and rules are shared read-only. Reports are written in
//! the order the paths were given.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use stencil::{Matcher, Parser, Pattern, RewriteRule, Rewriter, SearchOptions, SupportedLanguage};
use tracing::{debug, info, warn};

use crate::cli::{PatternArgs, ReplaceArgs, SearchArgs};
use crate::errors::AppError;

const CLI_TARGET: &str = "stencil_cli";

/// Summary of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// At least one match or replacement was produced.
    Matched,
    /// Every file was processed and nothing matched.
    Unmatched,
    /// One or more files failed; their errors were already reported.
    Failed,
}

#[derive(Debug)]
struct FileJob {
    path: PathBuf,
    language: SupportedLanguage,
}

#[derive(Debug, Default)]
struct FileReport {
    lines: Vec<String>,
    hits: usize,
}

/// Runs `stencil search`.
pub(crate) fn search<W, E>(
    args: &SearchArgs,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<Outcome, AppError>
where
    W: Write,
    E: Write,
{
    let jobs = plan_jobs(&args.pattern)?;
    let patterns = compile_patterns(&args.pattern, &jobs)?;
    let reports: Vec<Result<FileReport, AppError>> = jobs
        .par_iter()
        .map(|job| {
            let pattern = patterns.get(&job.language).ok_or_else(|| {
                AppError::UndetectedLanguage {
                    path: job.path.clone(),
                }
            })?;
            search_file(job, pattern, args.captures)
        })
        .collect();
    emit(reports, stdout, stderr)
}

/// Runs `stencil replace`.
pub(crate) fn replace<W, E>(
    args: &ReplaceArgs,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<Outcome, AppError>
where
    W: Write,
    E: Write,
{
    let jobs = plan_jobs(&args.pattern)?;
    let mut rules = HashMap::new();
    for (language, pattern) in compile_patterns(&args.pattern, &jobs)? {
        rules.insert(language, RewriteRule::new(pattern, &args.replacement)?);
    }
    let reports: Vec<Result<FileReport, AppError>> = jobs
        .par_iter()
        .map(|job| {
            let rule = rules
                .get(&job.language)
                .ok_or_else(|| AppError::UndetectedLanguage {
                    path: job.path.clone(),
                })?;
            rewrite_file(job, rule, args.in_place)
        })
        .collect();
    emit(reports, stdout, stderr)
}

fn plan_jobs(args: &PatternArgs) -> Result<Vec<FileJob>, AppError> {
    args.paths
        .iter()
        .map(|path| {
            let language = args
                .language
                .or_else(|| SupportedLanguage::from_path(path))
                .ok_or_else(|| AppError::UndetectedLanguage { path: path.clone() })?;
            Ok(FileJob {
                path: path.clone(),
                language,
            })
        })
        .collect()
}

fn compile_patterns(
    args: &PatternArgs,
    jobs: &[FileJob],
) -> Result<HashMap<SupportedLanguage, Pattern>, AppError> {
    let options = load_options(args.options.as_deref())?;
    let constraints = parse_constraints(&args.constraints)?;
    let mut patterns = HashMap::new();
    for job in jobs {
        if patterns.contains_key(&job.language) {
            continue;
        }
        let builder = constraints.iter().fold(
            Pattern::builder(args.pattern.as_str(), job.language).options(options),
            |pending, (name, text)| pending.constraint(*name, *text),
        );
        debug!(
            target: CLI_TARGET,
            language = %job.language,
            "compiling pattern"
        );
        patterns.insert(job.language, builder.build()?);
    }
    Ok(patterns)
}

fn load_options(path: Option<&Path>) -> Result<SearchOptions, AppError> {
    let Some(path) = path else {
        return Ok(SearchOptions::default());
    };
    let text = fs::read_to_string(path).map_err(|source| AppError::ReadOptions {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| AppError::ParseOptions {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_constraints(raw: &[String]) -> Result<Vec<(&str, &str)>, AppError> {
    raw.iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(name, text)| (name.trim(), text.trim()))
                .filter(|(name, text)| !name.is_empty() && !text.is_empty())
                .ok_or_else(|| AppError::InvalidConstraint(entry.clone()))
        })
        .collect()
}

fn read_source(path: &Path) -> Result<String, AppError> {
    fs::read_to_string(path).map_err(|source| AppError::ReadSource {
        path: path.to_path_buf(),
        source,
    })
}

fn search_file(job: &FileJob, pattern: &Pattern, captures: bool) -> Result<FileReport, AppError> {
    let source = read_source(&job.path)?;
    let mut parser = Parser::new(job.language)?;
    let parsed = parser.parse(&source)?;
    if parsed.has_errors() {
        warn!(
            target: CLI_TARGET,
            path = %job.path.display(),
            "file contains syntax errors; results may be incomplete"
        );
    }

    let matches = Matcher::new(pattern).find_all(&parsed);
    let mut report = FileReport {
        hits: matches.len(),
        ..FileReport::default()
    };
    for found in &matches {
        let (line, column) = found.start_position();
        let first_line = found.text().lines().next().unwrap_or_default();
        report.lines.push(format!(
            "{}:{line}:{column}: {first_line}",
            job.path.display()
        ));
        if captures {
            report.lines.extend(
                found
                    .captures()
                    .iter()
                    .map(|(name, value)| format!("    {name} = {}", value.text())),
            );
        }
    }
    info!(
        target: CLI_TARGET,
        path = %job.path.display(),
        matches = report.hits,
        "searched file"
    );
    Ok(report)
}

fn rewrite_file(job: &FileJob, rule: &RewriteRule, in_place: bool) -> Result<FileReport, AppError> {
    let original = read_source(&job.path)?;
    let result = Rewriter::new(job.language).apply(rule, &original)?;
    let hits = result.num_replacements();
    info!(
        target: CLI_TARGET,
        path = %job.path.display(),
        replacements = hits,
        "rewrote file"
    );

    let line = if in_place {
        if result.has_changes() {
            fs::write(&job.path, result.output()).map_err(|source| AppError::WriteSource {
                path: job.path.clone(),
                source,
            })?;
        }
        format!("{}: {hits} replacements", job.path.display())
    } else {
        result.output().trim_end_matches('\n').to_owned()
    };
    Ok(FileReport {
        lines: vec![line],
        hits,
    })
}

fn emit<W, E>(
    reports: Vec<Result<FileReport, AppError>>,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<Outcome, AppError>
where
    W: Write,
    E: Write,
{
    let mut hits = 0;
    let mut failed = false;
    for outcome in reports {
        match outcome {
            Ok(report) => {
                hits += report.hits;
                for line in &report.lines {
                    writeln!(stdout, "{line}")?;
                }
            }
            Err(error) => {
                failed = true;
                writeln!(stderr, "stencil: {error}")?;
            }
        }
    }
    stdout.flush()?;

    Ok(if failed {
        Outcome::Failed
    } else if hits == 0 {
        Outcome::Unmatched
    } else {
        Outcome::Matched
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("x=regex(^a)", ("x", "regex(^a)"))]
    #[case(" n = count(1,2) ", ("n", "count(1,2)"))]
    #[case("t=regex(a=b)", ("t", "regex(a=b)"))]
    fn constraints_split_on_the_first_equals(#[case] raw: &str, #[case] expected: (&str, &str)) {
        let entries = vec![raw.to_owned()];
        let parsed = parse_constraints(&entries).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(parsed, vec![expected]);
    }

    #[rstest]
    #[case("x")]
    #[case("=regex(a)")]
    #[case("x=")]
    fn malformed_constraints_are_rejected(#[case] raw: &str) {
        let entries = vec![raw.to_owned()];
        assert!(matches!(
            parse_constraints(&entries),
            Err(AppError::InvalidConstraint(_))
        ));
    }

    #[test]
    fn missing_options_file_defaults() {
        let options = load_options(None).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(options, SearchOptions::default());
    }

    #[test]
    fn failures_outrank_matches() {
        let reports = vec![
            Ok(FileReport {
                lines: vec!["a.py:1:1: print(1)".to_owned()],
                hits: 1,
            }),
            Err(AppError::InvalidConstraint("x".to_owned())),
        ];
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let outcome =
            emit(reports, &mut stdout, &mut stderr).unwrap_or_else(|err| panic!("{err}"));

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(String::from_utf8_lossy(&stdout), "a.py:1:1: print(1)\n");
        assert!(String::from_utf8_lossy(&stderr).starts_with("stencil: constraint 'x'"));
    }
}
