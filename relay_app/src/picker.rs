use std::path::PathBuf;

use relay_backend::services::file_dialog::FilePicker;

/// Native dialogs through `rfd`.
pub struct RfdPicker;

impl FilePicker for RfdPicker {
    fn pick_files(&mut self, extensions: &[String], allow_multiple: bool) -> Option<Vec<PathBuf>> {
        let mut dialog = rfd::FileDialog::new().set_title("Import");
        if !extensions.is_empty() {
            let filters: Vec<&str> = extensions.iter().map(|e| e.trim_start_matches('.')).collect();
            dialog = dialog.add_filter("Supported files", &filters[..]);
        }
        if allow_multiple {
            dialog.pick_files()
        } else {
            dialog.pick_file().map(|path| vec![path])
        }
    }

    fn pick_save_path(&mut self, file_name: &str) -> Option<PathBuf> {
        rfd::FileDialog::new().set_title("Export").set_file_name(file_name).save_file()
    }
}
