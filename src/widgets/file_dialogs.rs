//! Shared file dialog helpers.

use std::path::PathBuf;

use crate::export::EncodedImage;

/// Containers the decoder is expected to open.
pub const VIDEO_EXTS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi", "m4v", "gif"];

/// Dialog for picking the source video of a new project.
pub fn create_video_dialog(title: &str) -> rfd::FileDialog {
    rfd::FileDialog::new()
        .add_filter("Video Files", VIDEO_EXTS)
        .set_title(title)
}

/// Save-as dialog for an export artifact. `None` when the user cancels.
pub fn save_export_dialog(image: &EncodedImage, project_name: &str) -> Option<PathBuf> {
    let ext = image.format.extension();
    rfd::FileDialog::new()
        .add_filter(image.format.to_string(), &[ext])
        .set_file_name(image.suggested_file_name(project_name))
        .set_title("Save Export")
        .save_file()
}
