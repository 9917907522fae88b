use super::sound::{normalize_name, CatalogRecord};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["wav", "mp3", "ogg", "flac", "m4a"];

/// Immutable index produced by one scan, keyed by normalized name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: BTreeMap<String, CatalogRecord>,
}

impl Catalog {
    pub fn from_records(records: impl IntoIterator<Item = CatalogRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CatalogRecord> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Records in ascending name order.
    pub fn records(&self) -> impl Iterator<Item = &CatalogRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanWarning {
    MissingRoot(PathBuf),
    DuplicateName {
        name: String,
        kept: PathBuf,
        dropped: PathBuf,
    },
    Unreadable {
        path: PathBuf,
        error: String,
    },
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanWarning::MissingRoot(path) => {
                write!(f, "sounds directory not found: {}", path.display())
            }
            ScanWarning::DuplicateName { name, kept, dropped } => write!(
                f,
                "duplicate sound '{}': keeping {}, ignoring {}",
                name,
                kept.display(),
                dropped.display()
            ),
            ScanWarning::Unreadable { path, error } => {
                write!(f, "could not read {}: {}", path.display(), error)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub catalog: Catalog,
    pub warnings: Vec<ScanWarning>,
}

#[derive(Debug, Clone)]
pub struct SoundScanner {
    supported_extensions: Vec<String>,
}

impl SoundScanner {
    pub fn new() -> Self {
        Self {
            supported_extensions: SUPPORTED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Walk `root` and index every supported file.
    ///
    /// Paths are visited in lexicographic full-path order, so when two files normalize to
    /// the same name the first path wins and the rest come back as warnings.
    pub fn scan<P: AsRef<Path>>(&self, root: P) -> ScanReport {
        let root = root.as_ref();
        let mut warnings = Vec::new();

        if !root.exists() {
            warn!("Sounds directory not found: {}", root.display());
            warnings.push(ScanWarning::MissingRoot(root.to_path_buf()));
            return ScanReport {
                catalog: Catalog::default(),
                warnings,
            };
        }

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.is_supported_file(entry.path()) {
                        paths.push(entry.into_path());
                    }
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    warn!("Skipping unreadable entry {}: {}", path.display(), e);
                    warnings.push(ScanWarning::Unreadable {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }
        paths.sort();

        let mut records: BTreeMap<String, CatalogRecord> = BTreeMap::new();
        for path in paths {
            let Some(name) = normalize_name(&path) else {
                continue;
            };

            if let Some(existing) = records.get(&name) {
                warn!(
                    "Duplicate sound name '{}': keeping {}, dropping {}",
                    name,
                    existing.file_path.display(),
                    path.display()
                );
                warnings.push(ScanWarning::DuplicateName {
                    name,
                    kept: existing.file_path.clone(),
                    dropped: path,
                });
                continue;
            }

            let duration = self.probe_duration(&path);
            let file_path = path.canonicalize().unwrap_or(path);
            debug!("Indexed '{}' at {}", name, file_path.display());
            records.insert(name.clone(), CatalogRecord::new(name, file_path).with_duration(duration));
        }

        info!("Scanned {}: {} sounds", root.display(), records.len());
        ScanReport {
            catalog: Catalog::from_records(records.into_values()),
            warnings,
        }
    }

    fn is_supported_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let normalized = ext.to_ascii_lowercase();
                self.supported_extensions.contains(&normalized)
            })
            .unwrap_or(false)
    }

    #[cfg(not(feature = "probe"))]
    fn probe_duration(&self, _path: &Path) -> Option<std::time::Duration> {
        None
    }

    #[cfg(feature = "probe")]
    fn probe_duration(&self, path: &Path) -> Option<std::time::Duration> {
        match probe_duration_with_symphonia(path) {
            Ok(duration) => Some(duration),
            Err(e) => {
                debug!("No duration for {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl Default for SoundScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "probe")]
fn probe_duration_with_symphonia(path: &Path) -> Result<std::time::Duration, String> {
    use std::fs::File;
    use std::time::Duration;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = File::open(path).map_err(|e| e.to_string())?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| e.to_string())?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| "no decodable track".to_string())?;

    match (track.codec_params.time_base, track.codec_params.n_frames) {
        (Some(time_base), Some(n_frames)) => {
            let time = time_base.calc_time(n_frames);
            Ok(Duration::from_secs_f64(time.seconds as f64 + time.frac))
        }
        _ => Err("stream does not declare its length".to_string()),
    }
}
