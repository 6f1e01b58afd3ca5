//! Persisted token recording which backend kind the previous session used

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sqlx_backend_conn_mgr::BackendKind;
use tracing::{debug, warn};

/// Marker file name beneath the data directory.
pub const MARKER_FILE: &str = ".storage";

/// Reads and writes `<data_dir>/.storage`.
#[derive(Debug, Clone)]
pub struct StorageMarker {
   path: PathBuf,
}

impl StorageMarker {
   pub fn new(data_dir: &Path) -> Self {
      Self {
         path: data_dir.join(MARKER_FILE),
      }
   }

   pub fn path(&self) -> &Path {
      &self.path
   }

   /// Backend kind of the previous session. `None` when there was no
   /// previous session or the marker could not be read.
   pub fn read(&self) -> Option<BackendKind> {
      if !self.path.exists() {
         debug!(path = %self.path.display(), "No storage marker found");
         return None;
      }

      match fs::read_to_string(&self.path) {
         Ok(content) => Some(Self::parse(&content)),
         Err(e) => {
            warn!(path = %self.path.display(), error = %e, "Could not read storage marker");
            None
         }
      }
   }

   /// Interpret marker content. Anything other than the networked token
   /// counts as embedded.
   pub fn parse(content: &str) -> BackendKind {
      if content
         .trim()
         .eq_ignore_ascii_case(BackendKind::Networked.token())
      {
         BackendKind::Networked
      } else {
         BackendKind::Embedded
      }
   }

   pub fn write(&self, kind: BackendKind) -> io::Result<()> {
      if let Some(parent) = self.path.parent() {
         fs::create_dir_all(parent)?;
      }
      fs::write(&self.path, kind.token())?;
      debug!(path = %self.path.display(), backend = %kind, "Storage marker written");
      Ok(())
   }
}
