use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use autoassist_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;

#[derive(Deserialize, JsonSchema)]
pub struct WriteFileParameters {
    #[schemars(description = "The content to be written into the file. \
                              This can be text, insights, or generated \
                              outputs.")]
    content: String,
    #[schemars(description = "The target folder where the file will be \
                              stored. Organize files under folders as you \
                              find appropriate. For example you can use \
                              'insights' for analytical findings, 'publish' \
                              for content intended for distribution, and \
                              'notes' for miscellaneous records.")]
    folder: String,
    #[schemars(description = "The name of the file, including its \
                              extension (e.g., 'report.txt', 'insight.md').")]
    filename: String,
}

/// A tool that writes a file into a folder of the outputs directory.
pub struct WriteFileTool {
    root: PathBuf,
    parameter_schema: Value,
}

impl WriteFileTool {
    /// Creates a tool that writes into `root`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            parameter_schema: schema_for!(WriteFileParameters).to_value(),
        }
    }
}

impl Tool for WriteFileTool {
    type Input = WriteFileParameters;

    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        r#"
Writes content to a file in the specified folder, which can be retrieved later.
Use this function when you want to store insights, intermediate outputs, or final results aligned with your objectives for future reference or publishing."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: WriteFileParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let root = self.root.clone();
        async move {
            let folder = root.join(check_name("folder", &input.folder)?);
            let path = folder.join(check_name("file", &input.filename)?);

            fs::create_dir_all(&folder).await.map_err(io_error)?;
            info!("writing {}", path.display());
            fs::write(&path, input.content).await.map_err(io_error)?;
            Ok(String::new())
        }
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct ReadFileParameters {
    #[schemars(description = "The folder where the file is stored.")]
    folder: String,
    #[schemars(description = "The name of the file to read.")]
    filename: String,
}

/// A tool that reads a file from a folder of the outputs directory.
pub struct ReadFileTool {
    root: PathBuf,
    parameter_schema: Value,
}

impl ReadFileTool {
    /// Creates a tool that reads from `root`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            parameter_schema: schema_for!(ReadFileParameters).to_value(),
        }
    }
}

impl Tool for ReadFileTool {
    type Input = ReadFileParameters;

    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of the given file under the given folder."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ReadFileParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let root = self.root.clone();
        async move {
            let ReadFileParameters { folder, filename } = input;
            let path = root
                .join(check_name("folder", &folder)?)
                .join(check_name("file", &filename)?);

            if !is_kind(&path, EntryKind::File).await {
                return Ok(format!(
                    "File '{filename}' not found in folder '{folder}'. You \
                     may want to get a list of available files with \
                     list_files('{folder}') first."
                ));
            }
            fs::read_to_string(&path).await.map_err(io_error)
        }
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct ListFoldersParameters {}

/// A tool that lists the folders of the outputs directory.
pub struct ListFoldersTool {
    root: PathBuf,
    parameter_schema: Value,
}

impl ListFoldersTool {
    /// Creates a tool that lists the folders in `root`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            parameter_schema: schema_for!(ListFoldersParameters).to_value(),
        }
    }
}

impl Tool for ListFoldersTool {
    type Input = ListFoldersParameters;

    fn name(&self) -> &str {
        "list_folders"
    }

    fn description(&self) -> &str {
        "List the folders available."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        _input: ListFoldersParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let root = self.root.clone();
        async move {
            // Nothing has been written yet.
            if !is_kind(&root, EntryKind::Folder).await {
                return Ok(String::new());
            }
            let names = list_entries(&root, EntryKind::Folder)
                .await
                .map_err(io_error)?;
            Ok(names.join("\n"))
        }
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct ListFilesParameters {
    #[schemars(description = "The folder to list the files of.")]
    folder: String,
}

/// A tool that lists the files in a folder of the outputs directory.
pub struct ListFilesTool {
    root: PathBuf,
    parameter_schema: Value,
}

impl ListFilesTool {
    /// Creates a tool that lists the files of the folders in `root`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            parameter_schema: schema_for!(ListFilesParameters).to_value(),
        }
    }
}

impl Tool for ListFilesTool {
    type Input = ListFilesParameters;

    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the files in the given folder."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ListFilesParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let root = self.root.clone();
        async move {
            let folder = input.folder;
            let path = root.join(check_name("folder", &folder)?);
            if !is_kind(&path, EntryKind::Folder).await {
                return Ok(format!(
                    "There is no directory called '{folder}'. You may want \
                     to call 'list_folders' first to get a list of \
                     available folders."
                ));
            }
            let names = list_entries(&path, EntryKind::File)
                .await
                .map_err(io_error)?;
            Ok(names.join("\n"))
        }
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct SleepParameters {
    #[schemars(description = "The duration to sleep, in seconds.")]
    duration: f64,
}

/// A tool that does nothing for a while.
pub struct SleepTool {
    parameter_schema: Value,
}

impl SleepTool {
    /// Creates a new sleep tool.
    #[inline]
    pub fn new() -> Self {
        Self {
            parameter_schema: schema_for!(SleepParameters).to_value(),
        }
    }
}

impl Default for SleepTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for SleepTool {
    type Input = SleepParameters;

    fn name(&self) -> &str {
        "sleep"
    }

    fn description(&self) -> &str {
        "Do nothing for the given period."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: SleepParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            let duration = Duration::try_from_secs_f64(input.duration)
                .map_err(|err| {
                    ToolError::invalid_input().with_reason(err.to_string())
                })?;
            info!("sleeping for {duration:?}");
            tokio::time::sleep(duration).await;
            Ok(String::new())
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Folder,
}

/// Accepts a name only if it addresses a direct child of a directory.
fn check_name<'a>(what: &str, name: &'a str) -> Result<&'a str, ToolError> {
    let mut components = Path::new(name).components();
    let is_child = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if is_child && !name.contains(['/', '\\']) {
        Ok(name)
    } else {
        Err(ToolError::invalid_input()
            .with_reason(format!("'{name}' is not a valid {what} name")))
    }
}

async fn is_kind(path: &Path, kind: EntryKind) -> bool {
    match fs::metadata(path).await {
        Ok(metadata) => match kind {
            EntryKind::File => metadata.is_file(),
            EntryKind::Folder => metadata.is_dir(),
        },
        Err(_) => false,
    }
}

/// Returns the sorted names of the entries of a kind in `dir`.
async fn list_entries(
    dir: &Path,
    kind: EntryKind,
) -> io::Result<Vec<String>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut names = vec![];
    while let Some(entry) = entries.next_entry().await? {
        let file_type = entry.file_type().await?;
        let matched = match kind {
            EntryKind::File => file_type.is_file(),
            EntryKind::Folder => file_type.is_dir(),
        };
        if matched {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[inline]
fn io_error(err: io::Error) -> ToolError {
    ToolError::execution_error().with_reason(err.to_string())
}

#[cfg(test)]
mod tests {
    use autoassist_core::tool::ErrorKind;

    use super::*;

    fn write(
        folder: &str,
        filename: &str,
        content: &str,
    ) -> WriteFileParameters {
        WriteFileParameters {
            content: content.to_owned(),
            folder: folder.to_owned(),
            filename: filename.to_owned(),
        }
    }

    fn read(folder: &str, filename: &str) -> ReadFileParameters {
        ReadFileParameters {
            folder: folder.to_owned(),
            filename: filename.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let content = "# Weekly digest\n\nNew releases: ✨\n";

        let output = WriteFileTool::new(dir.path())
            .execute(write("publish", "digest.md", content))
            .await
            .unwrap();
        assert_eq!(output, "");

        let output = ReadFileTool::new(dir.path())
            .execute(read("publish", "digest.md"))
            .await
            .unwrap();
        assert_eq!(output, content);

        // Writing again replaces the file.
        WriteFileTool::new(dir.path())
            .execute(write("publish", "digest.md", "v2"))
            .await
            .unwrap();
        let output = ReadFileTool::new(dir.path())
            .execute(read("publish", "digest.md"))
            .await
            .unwrap();
        assert_eq!(output, "v2");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("notes")).unwrap();

        let output = ReadFileTool::new(dir.path())
            .execute(read("notes", "todo.txt"))
            .await
            .unwrap();
        assert_eq!(
            output,
            "File 'todo.txt' not found in folder 'notes'. You may want to \
             get a list of available files with list_files('notes') first."
        );

        // A folder is not a file either.
        std::fs::create_dir(dir.path().join("notes").join("archive")).unwrap();
        let output = ReadFileTool::new(dir.path())
            .execute(read("notes", "archive"))
            .await
            .unwrap();
        assert!(output.starts_with("File 'archive' not found"));
    }

    #[tokio::test]
    async fn test_listings() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("outputs");

        // Nothing written yet.
        let output = ListFoldersTool::new(&root)
            .execute(ListFoldersParameters {})
            .await
            .unwrap();
        assert_eq!(output, "");

        let writer = WriteFileTool::new(&root);
        writer.execute(write("notes", "b.txt", "b")).await.unwrap();
        writer.execute(write("notes", "a.txt", "a")).await.unwrap();
        writer.execute(write("insights", "c.md", "c")).await.unwrap();
        std::fs::create_dir(root.join("empty")).unwrap();
        std::fs::create_dir(root.join("notes").join("nested")).unwrap();

        let output = ListFoldersTool::new(&root)
            .execute(ListFoldersParameters {})
            .await
            .unwrap();
        assert_eq!(output, "empty\ninsights\nnotes");

        let list_files = ListFilesTool::new(&root);
        let output = list_files
            .execute(ListFilesParameters {
                folder: "notes".to_owned(),
            })
            .await
            .unwrap();
        assert_eq!(output, "a.txt\nb.txt");

        let output = list_files
            .execute(ListFilesParameters {
                folder: "empty".to_owned(),
            })
            .await
            .unwrap();
        assert_eq!(output, "");

        let output = list_files
            .execute(ListFilesParameters {
                folder: "drafts".to_owned(),
            })
            .await
            .unwrap();
        assert!(output.starts_with("There is no directory called 'drafts'"));
        assert!(output.contains("'list_folders'"));
    }

    #[tokio::test]
    async fn test_names_must_stay_inside() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("outputs");
        let writer = WriteFileTool::new(&root);

        for (folder, filename) in [
            ("..", "escape.txt"),
            ("notes", "../escape.txt"),
            ("/tmp", "escape.txt"),
            ("a/b", "file.txt"),
            ("notes", ""),
            ("notes", "..\\escape.txt"),
        ] {
            let err = writer
                .execute(write(folder, filename, "x"))
                .await
                .unwrap_err();
            assert_eq!(
                err.kind(),
                ErrorKind::InvalidInput,
                "{folder}/{filename}"
            );
        }
        assert!(!dir.path().join("escape.txt").exists());
        assert!(!root.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep() {
        let tool = SleepTool::new();
        let start = tokio::time::Instant::now();
        let output = tool
            .execute(SleepParameters { duration: 1.5 })
            .await
            .unwrap();
        assert_eq!(output, "");
        assert!(start.elapsed() >= Duration::from_millis(1500));

        let err = tool
            .execute(SleepParameters { duration: -1.0 })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
