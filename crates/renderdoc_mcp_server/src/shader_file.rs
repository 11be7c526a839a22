//! Writes shader source to disk so tool results stay small.

use std::path::{Path, PathBuf};

use renderdoc_bridge_core::types::{ShaderSource, ShaderStage, EMBEDDED_SOURCE_TARGET};
use serde::Serialize;

pub const DEFAULT_ROOT: &str = "renderdoc";

#[derive(Debug, Clone, Serialize)]
pub struct SavedShader {
    pub file_path: String,
    /// Markdown link to the file, for display in chat.
    pub file_link: String,
    pub file_size: u64,
    pub line_count: usize,
    pub stage: ShaderStage,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_method: Option<String>,
    pub available_targets: Vec<String>,
    pub entry_point: String,
    pub resource_id: String,
}

pub fn extension_for(target: &str) -> &'static str {
    let target = target.to_lowercase();
    if target.contains("glsl") || target.contains("embedded") {
        ".glsl"
    } else if target.contains("hlsl") {
        ".hlsl"
    } else if target.contains("spir") {
        ".spvasm"
    } else {
        ".txt"
    }
}

pub fn file_name(event_id: u32, stage: ShaderStage, entry_point: &str, target: &str) -> String {
    let ext = extension_for(target);
    let raw = if entry_point.is_empty() {
        format!("shader_eid{event_id}_{stage}{ext}")
    } else {
        format!("shader_eid{event_id}_{stage}_{entry_point}{ext}")
    };
    sanitize(&raw, &['.', '_', '-'])
}

/// `<root>/<capture stem>`, or just `<root>` when there is no usable name.
pub fn default_dir(root: &Path, capture_filename: Option<&str>) -> PathBuf {
    let stem = capture_filename
        .and_then(|name| Path::new(name).file_stem())
        .map(|stem| sanitize(&stem.to_string_lossy(), &['.', '_', '-', ' ']))
        .map(|stem| stem.trim().to_string())
        .filter(|stem| !stem.is_empty());
    match stem {
        Some(stem) => root.join(stem),
        None => root.to_path_buf(),
    }
}

pub async fn save(dir: &Path, event_id: u32, source: &ShaderSource) -> std::io::Result<SavedShader> {
    tokio::fs::create_dir_all(dir).await?;
    // Embedded source is named after its language, not the pseudo target.
    let language = match &source.source_encoding {
        Some(encoding) if source.target == EMBEDDED_SOURCE_TARGET => encoding.as_str(),
        _ => source.target.as_str(),
    };
    let name = file_name(event_id, source.stage, &source.entry_point, language);
    let path = dir.join(&name);
    tokio::fs::write(&path, source.source_code.as_bytes()).await?;

    let resolved = tokio::fs::canonicalize(&path).await.unwrap_or(path);
    let file_path = resolved.display().to_string();
    let file_size = tokio::fs::metadata(&resolved).await?.len();
    tracing::debug!("Saved shader source to {}", file_path);

    Ok(SavedShader {
        file_link: format!("[{name}]({})", file_path.replace('\\', "/")),
        file_path,
        file_size,
        line_count: source.source_code.matches('\n').count() + 1,
        stage: source.stage,
        target: source.target.clone(),
        source_method: source.source_method.clone(),
        available_targets: source.available_targets.clone(),
        entry_point: source.entry_point.clone(),
        resource_id: source.resource_id.to_string(),
    })
}

fn sanitize(raw: &str, keep: &[char]) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() || keep.contains(&c) { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderdoc_bridge_core::types::ResourceId;

    #[test]
    fn test_extension_follows_target() {
        assert_eq!(extension_for("GLSL (cross-compiled)"), ".glsl");
        assert_eq!(extension_for("HLSL"), ".hlsl");
        assert_eq!(extension_for("SPIR-V"), ".spvasm");
        assert_eq!(extension_for("DXBC"), ".txt");
    }

    #[test]
    fn test_file_name_is_sanitized() {
        assert_eq!(
            file_name(42, ShaderStage::Pixel, "PS::Main", "SPIR-V"),
            "shader_eid42_pixel_PS__Main.spvasm"
        );
        assert_eq!(
            file_name(7, ShaderStage::Vertex, "", "GLSL"),
            "shader_eid7_vertex.glsl"
        );
    }

    #[test]
    fn test_default_dir_uses_capture_stem() {
        let root = Path::new("renderdoc");
        assert_eq!(
            default_dir(root, Some("frame 12.rdc")),
            root.join("frame 12")
        );
        assert_eq!(default_dir(root, Some("a/b:c.rdc")), root.join("b_c"));
        assert_eq!(default_dir(root, None), root.to_path_buf());
    }

    #[tokio::test]
    async fn test_save_writes_source() {
        let dir = std::env::temp_dir().join(format!("renderdoc-mcp-shader-{}", std::process::id()));
        let source = ShaderSource {
            resource_id: ResourceId(302),
            entry_point: "PSMain".to_string(),
            stage: ShaderStage::Pixel,
            target: "GLSL (cross-compiled)".to_string(),
            source_code: "void main()\n{\n}".to_string(),
            available_targets: vec!["SPIR-V".to_string(), "GLSL (cross-compiled)".to_string()],
            source_encoding: None,
            source_method: None,
            debug_source_files: Vec::new(),
            all_sources: Default::default(),
        };

        let saved = save(&dir, 7, &source).await.unwrap();
        assert!(saved.file_path.ends_with("shader_eid7_pixel_PSMain.glsl"));
        assert_eq!(saved.line_count, 3);
        assert_eq!(saved.file_size, source.source_code.len() as u64);
        assert_eq!(saved.resource_id, "ResourceId::302");
        let written = std::fs::read_to_string(&saved.file_path).unwrap();
        assert_eq!(written, source.source_code);
    }

    #[tokio::test]
    async fn test_embedded_source_named_after_its_encoding() {
        let dir = std::env::temp_dir().join(format!(
            "renderdoc-mcp-embedded-{}",
            std::process::id()
        ));
        let source = ShaderSource {
            resource_id: ResourceId(9),
            entry_point: "main".to_string(),
            stage: ShaderStage::Vertex,
            target: EMBEDDED_SOURCE_TARGET.to_string(),
            source_code: "#version 310 es\nvoid main() {}".to_string(),
            available_targets: vec![],
            source_encoding: Some("GLSL".to_string()),
            source_method: Some("raw_bytes".to_string()),
            debug_source_files: Vec::new(),
            all_sources: Default::default(),
        };

        let saved = save(&dir, 3, &source).await.unwrap();
        assert!(saved.file_path.ends_with("shader_eid3_vertex_main.glsl"));
        assert_eq!(saved.source_method.as_deref(), Some("raw_bytes"));
    }
}
