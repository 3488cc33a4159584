//! Call-site resolution with a process-lifetime cache
//!
//! Call sites are keyed by an address that is unique to the site: either the
//! return address found while walking the stack, or the address of the
//! compiler-recorded [`Location`] handed out by `#[track_caller]`. Both kinds
//! of key are static for the lifetime of the binary, so entries are never
//! evicted. Two threads missing on the same key at the same time will both
//! build the entry and the later insert wins; the values are identical.

use crate::error::{Error, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A resolved source location
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSite {
    /// Enclosing function, when symbol information is available
    pub function: Option<String>,
    /// Path relative to the working directory, or the full path when outside it
    pub short_path: String,
    /// Path as recorded in debug info or by the compiler
    pub full_path: String,
    /// Base name of the source file
    pub file_name: String,
    /// Source line
    pub line: u32,
}

impl CallSite {
    fn new(function: Option<String>, full_path: &Path, line: u32, working_dir: &Path) -> Self {
        let short_path = full_path
            .strip_prefix(working_dir)
            .unwrap_or(full_path)
            .display()
            .to_string();
        let file_name = full_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            function,
            short_path,
            full_path: full_path.display().to_string(),
            file_name,
            line,
        }
    }

    fn unlocated(function: String) -> Self {
        Self {
            function: Some(function),
            short_path: String::new(),
            full_path: String::new(),
            file_name: String::new(),
            line: 0,
        }
    }

    /// Whether the source file and line are known
    pub fn has_location(&self) -> bool {
        !self.file_name.is_empty()
    }

    /// `file_name:line`, the form written into log lines; empty when the
    /// binary carries no line information
    pub fn file_line(&self) -> String {
        if !self.has_location() {
            return String::new();
        }
        format!("{}:{}", self.file_name, self.line)
    }
}

/// Memoizing resolver for call sites
#[derive(Debug)]
pub struct LocationResolver {
    cache: DashMap<usize, Arc<CallSite>>,
    working_dir: PathBuf,
}

impl LocationResolver {
    /// Create a resolver that shortens paths relative to the current directory
    pub fn new() -> Self {
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self::with_working_dir(working_dir)
    }

    /// Create a resolver that shortens paths relative to `working_dir`
    pub fn with_working_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache: DashMap::new(),
            working_dir: working_dir.into(),
        }
    }

    /// Resolve the caller of this function, skipping `skip` further frames.
    ///
    /// `skip = 0` yields the function that called `resolve`. Repeated calls from
    /// the same site cost a stack walk plus a cache lookup; symbolization only
    /// happens on the first call.
    #[inline(never)]
    pub fn resolve(&self, skip: usize) -> Result<Arc<CallSite>> {
        let anchor = Self::resolve as fn(&Self, usize) -> Result<Arc<CallSite>> as usize;

        let mut found_anchor = false;
        let mut remaining = skip;
        let mut address = None;
        backtrace::trace(|frame| {
            if !found_anchor {
                found_anchor = frame.symbol_address() as usize == anchor;
                return true;
            }
            if remaining > 0 {
                remaining -= 1;
                return true;
            }
            address = Some(frame.ip() as usize);
            false
        });

        let address = address.ok_or_else(|| {
            Error::ResolutionUnavailable(format!("stack is shallower than {skip} frames"))
        })?;

        if let Some(site) = self.cache.get(&address) {
            return Ok(site.clone());
        }

        let site = Arc::new(self.symbolize(address)?);
        self.cache.insert(address, site.clone());
        Ok(site)
    }

    /// Resolve a location recorded by `#[track_caller]`. Never fails.
    pub fn resolve_location(&self, location: &'static Location<'static>) -> Arc<CallSite> {
        let key = location as *const Location<'static> as usize;
        self.resolve_static(key, None, location.file(), location.line())
    }

    /// Cache a site whose file and line are already known, keyed by the
    /// address of the static data that describes it
    pub(crate) fn resolve_static(
        &self,
        key: usize,
        function: Option<&str>,
        file: &str,
        line: u32,
    ) -> Arc<CallSite> {
        if let Some(site) = self.cache.get(&key) {
            return site.clone();
        }

        let site = Arc::new(CallSite::new(
            function.map(str::to_string),
            Path::new(file),
            line,
            &self.working_dir,
        ));
        self.cache.insert(key, site.clone());
        site
    }

    /// Number of distinct call sites resolved so far
    pub fn cached_sites(&self) -> usize {
        self.cache.len()
    }

    /// Symbolize `address`. Without debug info only the function name is
    /// known, and the site is returned without a file or line.
    fn symbolize(&self, address: usize) -> Result<CallSite> {
        let mut function: Option<String> = None;
        let mut location: Option<(PathBuf, u32)> = None;

        backtrace::resolve(address as *mut std::ffi::c_void, |symbol| {
            if location.is_some() {
                return;
            }
            let name = symbol.name().map(|name| format!("{name:#}"));
            if let (Some(file), Some(line)) = (symbol.filename(), symbol.lineno()) {
                location = Some((file.to_path_buf(), line));
                function = name.or(function.take());
            } else if function.is_none() {
                function = name;
            }
        });

        match (location, function) {
            (Some((file, line)), function) => {
                Ok(CallSite::new(function, &file, line, &self.working_dir))
            }
            (None, Some(function)) => Ok(CallSite::unlocated(function)),
            (None, None) => Err(Error::ResolutionUnavailable(format!(
                "no symbol information for {address:#x}"
            ))),
        }
    }
}

impl Default for LocationResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn caller_location() -> &'static Location<'static> {
        Location::caller()
    }

    #[test]
    fn test_track_caller_location_is_cached() {
        let resolver = LocationResolver::new();

        let mut sites = Vec::new();
        for _ in 0..3 {
            sites.push(resolver.resolve_location(caller_location()));
        }

        assert_eq!(resolver.cached_sites(), 1);
        assert!(Arc::ptr_eq(&sites[0], &sites[2]));
        assert_eq!(sites[0].file_name, "location.rs");
    }

    #[test]
    fn test_distinct_sites_get_distinct_entries() {
        let resolver = LocationResolver::new();

        let first = resolver.resolve_location(caller_location());
        let second = resolver.resolve_location(caller_location());

        assert_eq!(resolver.cached_sites(), 2);
        assert_eq!(second.line, first.line + 1);
    }

    #[test]
    fn test_short_path_strips_working_dir() {
        let site = CallSite::new(
            Some("app::handler".to_string()),
            Path::new("/srv/app/src/handler.rs"),
            42,
            Path::new("/srv/app"),
        );

        assert_eq!(site.short_path, "src/handler.rs");
        assert_eq!(site.full_path, "/srv/app/src/handler.rs");
        assert_eq!(site.file_name, "handler.rs");
        assert_eq!(site.file_line(), "handler.rs:42");
    }

    #[test]
    fn test_short_path_keeps_paths_outside_working_dir() {
        let site = CallSite::new(None, Path::new("/opt/lib/x.rs"), 7, Path::new("/srv/app"));
        assert_eq!(site.short_path, "/opt/lib/x.rs");
    }

    #[test]
    fn test_unlocated_site_has_empty_file_line() {
        let site = CallSite::unlocated("app::handler".to_string());

        assert!(!site.has_location());
        assert_eq!(site.file_line(), "");
        assert_eq!(site.function.as_deref(), Some("app::handler"));
    }

    #[test]
    fn test_too_deep_skip_is_unavailable() {
        let resolver = LocationResolver::new();
        let result = resolver.resolve(100_000);
        assert!(matches!(result, Err(Error::ResolutionUnavailable(_))));
    }
}
