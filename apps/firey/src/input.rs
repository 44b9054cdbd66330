//! Resolving the paths and methods to probe from command-line input.

use std::fs;
use std::path::Path;

use probeup::DEFAULT_METHODS;

use crate::error::AppError;

/// The single `-p` path first, then the entries of the `-l` file
pub fn collect_paths(single: Option<&str>, list: Option<&Path>) -> Result<Vec<String>, AppError> {
    let mut paths = Vec::new();

    if let Some(path) = single.filter(|p| !p.is_empty()) {
        paths.push(path.to_string());
    }

    if let Some(list) = list {
        let contents = fs::read_to_string(list)
            .map_err(|source| AppError::PathList { path: list.to_path_buf(), source })?;
        paths.extend(parse_path_list(&contents));
    }

    if paths.is_empty() {
        return Err(AppError::NoPaths);
    }

    Ok(paths)
}

/// One path per line; blank lines and `#` comments are skipped
pub fn parse_path_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Comma-separated, trimmed and upper-cased; defaults when not given
pub fn parse_methods(raw: Option<&str>) -> Result<Vec<String>, AppError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_METHODS.iter().map(|m| m.to_string()).collect());
    };

    let methods: Vec<String> = raw
        .split(',')
        .map(|m| m.trim().to_uppercase())
        .filter(|m| !m.is_empty())
        .collect();

    if methods.is_empty() {
        return Err(AppError::NoMethods);
    }

    Ok(methods)
}
