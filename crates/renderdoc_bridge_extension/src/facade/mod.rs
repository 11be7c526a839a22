//! The capture facade: the only code that touches replay state.
//!
//! Every method runs on the replay worker thread. Queries borrow the loaded
//! [`CaptureSession`]; only `open_capture` and `close_capture` replace it.

mod actions;
mod pipeline;
mod resources;
mod search;
mod summary;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use renderdoc_bridge_core::types::{
    CaptureFile, CaptureList, CaptureStatus, CloseCaptureResponse, OpenCaptureResponse,
    PingResponse,
};

use crate::error::FacadeError;
use crate::replay::ReplayEngine;
use crate::session::CaptureSession;

pub const CAPTURE_EXTENSION: &str = "rdc";

pub struct CaptureFacade {
    engine: Box<dyn ReplayEngine>,
    session: Option<CaptureSession>,
    max_blob_bytes: usize,
}

impl CaptureFacade {
    pub fn new(engine: Box<dyn ReplayEngine>, max_blob_bytes: usize) -> Self {
        Self {
            engine,
            session: None,
            max_blob_bytes,
        }
    }

    pub fn ping(&self) -> PingResponse {
        PingResponse {
            status: "ok".to_string(),
            message: "pong".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// `.rdc` files directly under `directory`, ordered by file name.
    pub fn list_captures(&self, directory: &str) -> Result<CaptureList, FacadeError> {
        let dir = Path::new(directory);
        if !dir.is_dir() {
            return Err(FacadeError::NotFound(format!(
                "Directory not found: {directory}"
            )));
        }

        let mut captures = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(crate::error::ReplayError::from)? {
            let entry = entry.map_err(crate::error::ReplayError::from)?;
            let path = entry.path();
            let is_capture = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(CAPTURE_EXTENSION));
            if !is_capture {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let modified_time = metadata
                .modified()
                .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
                .unwrap_or_default();
            captures.push(CaptureFile {
                filename: entry.file_name().to_string_lossy().into_owned(),
                path: path.display().to_string(),
                size_bytes: metadata.len(),
                modified_time,
            });
        }
        captures.sort_by(|a, b| a.filename.cmp(&b.filename));

        Ok(CaptureList {
            directory: directory.to_string(),
            count: captures.len(),
            captures,
        })
    }

    /// Replaces the current session. The old controller is shut down before
    /// the new file is touched, so a failed open leaves nothing loaded.
    pub fn open_capture(&mut self, capture_path: &str) -> Result<OpenCaptureResponse, FacadeError> {
        if let Some(previous) = self.session.take() {
            previous.close();
        }

        let path = PathBuf::from(capture_path);
        if !path.is_file() {
            return Err(FacadeError::LoadError(format!(
                "Capture file not found: {capture_path}"
            )));
        }

        tracing::info!("Opening capture {}", path.display());
        let controller = self
            .engine
            .open_capture(&path)
            .map_err(|e| FacadeError::LoadError(e.to_string()))?;

        let session = match CaptureSession::new(&path, controller) {
            Ok(session) => session,
            Err((message, controller)) => {
                controller.shutdown();
                return Err(FacadeError::LoadError(message));
            }
        };

        let response = OpenCaptureResponse {
            success: true,
            filename: session.filename().to_string(),
            path: session.path().display().to_string(),
            api: session.api().to_string(),
            total_events: session.total_events(),
        };
        tracing::info!(
            "Loaded {} ({} API, {} events)",
            response.filename,
            response.api,
            response.total_events
        );
        self.session = Some(session);
        Ok(response)
    }

    pub fn close_capture(&mut self) -> CloseCaptureResponse {
        match self.session.take() {
            Some(session) => {
                let filename = session.filename().to_string();
                session.close();
                CloseCaptureResponse {
                    closed: true,
                    filename: Some(filename),
                }
            }
            None => CloseCaptureResponse {
                closed: false,
                filename: None,
            },
        }
    }

    pub fn get_capture_status(&self) -> CaptureStatus {
        match &self.session {
            Some(session) => CaptureStatus {
                loaded: true,
                filename: Some(session.filename().to_string()),
                api: Some(session.api().to_string()),
                total_events: Some(session.total_events()),
            },
            None => CaptureStatus {
                loaded: false,
                filename: None,
                api: None,
                total_events: None,
            },
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    fn session(&self) -> Result<&CaptureSession, FacadeError> {
        self.session.as_ref().ok_or(FacadeError::NotLoaded)
    }

    fn session_mut(&mut self) -> Result<&mut CaptureSession, FacadeError> {
        self.session.as_mut().ok_or(FacadeError::NotLoaded)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::document::DocumentEngine;
    use renderdoc_bridge_core::ErrorKind;
    use serde_json::json;

    fn empty_facade() -> CaptureFacade {
        CaptureFacade::new(Box::new(DocumentEngine::new()), 1024)
    }

    #[test]
    fn test_status_without_capture() {
        let mut facade = empty_facade();
        let status = facade.get_capture_status();
        assert!(!status.loaded);
        assert_eq!(status.filename, None);
        assert_eq!(
            facade.get_frame_summary().unwrap_err().kind(),
            ErrorKind::NotLoaded
        );
    }

    #[test]
    fn test_open_then_status_reports_same_file() {
        let path = write_capture("status", &sample_document());
        let mut facade = empty_facade();
        let opened = facade.open_capture(&path.display().to_string()).unwrap();
        assert_eq!(opened.filename, "status.rdc");
        assert_eq!(opened.api, "Vulkan");
        assert_eq!(opened.total_events, 13);

        let status = facade.get_capture_status();
        assert!(status.loaded);
        assert_eq!(status.filename.as_deref(), Some("status.rdc"));
        assert_eq!(status.total_events, Some(13));
    }

    #[test]
    fn test_second_open_replaces_first() {
        let first = write_capture("first", &sample_document());
        let second = write_capture("second", &json!({"api": "D3D11", "actions": [
            {"event_id": 1, "name": "Draw(3)", "flags": ["Drawcall"]}
        ]}));
        let mut facade = empty_facade();
        facade.open_capture(&first.display().to_string()).unwrap();
        facade.open_capture(&second.display().to_string()).unwrap();

        let status = facade.get_capture_status();
        assert_eq!(status.filename.as_deref(), Some("second.rdc"));
        assert_eq!(status.api.as_deref(), Some("D3D11"));
        assert_eq!(status.total_events, Some(1));
    }

    #[test]
    fn test_failed_open_leaves_nothing_loaded() {
        let mut facade = loaded_facade();
        let err = facade.open_capture("/definitely/not/here.rdc").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadError);
        assert!(!facade.is_loaded());

        let bad_ids = write_capture("bad-ids", &json!({"api": "Vulkan", "actions": [
            {"event_id": 5, "name": "a"}, {"event_id": 4, "name": "b"}
        ]}));
        let err = facade.open_capture(&bad_ids.display().to_string()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadError);

        let unsupported = write_capture("glide", &json!({"api": "Glide"}));
        let err = facade.open_capture(&unsupported.display().to_string()).unwrap_err();
        assert!(err.to_string().contains("Glide"));
    }

    #[test]
    fn test_close_capture_is_idempotent() {
        let mut facade = loaded_facade();
        let closed = facade.close_capture();
        assert!(closed.closed);
        assert_eq!(closed.filename.as_deref(), Some("sample.rdc"));
        assert!(!facade.close_capture().closed);
        assert!(!facade.get_capture_status().loaded);
    }

    #[test]
    fn test_list_captures_sorted_and_filtered() {
        let dir = unique_dir("list");
        std::fs::write(dir.join("b.rdc"), b"{}").unwrap();
        std::fs::write(dir.join("a.RDC"), b"{}").unwrap();
        std::fs::write(dir.join("notes.txt"), b"x").unwrap();
        std::fs::create_dir_all(dir.join("nested.rdc")).unwrap();

        let facade = empty_facade();
        let list = facade.list_captures(&dir.display().to_string()).unwrap();
        let names: Vec<_> = list.captures.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(names, vec!["a.RDC", "b.rdc"]);
        assert_eq!(list.count, 2);
        assert_eq!(list.captures[1].size_bytes, 2);
        assert!(DateTime::parse_from_rfc3339(&list.captures[0].modified_time).is_ok());

        let err = facade.list_captures("/no/such/renderdoc/dir").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
