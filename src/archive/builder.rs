//! Package archive builder
//!
//! Writes closure packages either from a source directory tree or from an
//! explicit entry list. A `manifest` file already present in the source set
//! is trusted verbatim; otherwise the manifest is generated from the
//! language mappings matched by the source file extensions. The
//! `languages.config` entry is emitted only when at least one matched
//! language declares a runtime-context binding.

use std::fs::{self, File};
use std::io::{self, Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::config::{is_rooted, ArchiveConfig, LanguageInfo};
use super::entry::ArchiveEntry;
use super::manifest::{parse_parts, LANGUAGES_ENTRY_NAME, MANIFEST_ENTRY_NAME};
use super::ArchiveError;

/// Builds closure package archives.
pub struct ArchiveBuilder;

impl ArchiveBuilder {
    /// Package a source directory tree into an archive file.
    pub fn write_dir_to_file(
        config: &ArchiveConfig,
        source_dir: &Path,
        out_path: &Path,
    ) -> Result<(), ArchiveError> {
        let mut zip = ZipWriter::new(File::create(out_path)?);
        Self::pack_dir(&mut zip, config, source_dir)?;
        zip.finish()?;
        Ok(())
    }

    /// Package a source directory tree into memory.
    pub fn write_dir_to_memory(
        config: &ArchiveConfig,
        source_dir: &Path,
    ) -> Result<Vec<u8>, ArchiveError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        Self::pack_dir(&mut zip, config, source_dir)?;
        Ok(zip.finish()?.into_inner())
    }

    /// Package an explicit entry list into an archive file.
    pub fn write_entries_to_file(
        config: &ArchiveConfig,
        entries: Vec<ArchiveEntry>,
        out_path: &Path,
    ) -> Result<(), ArchiveError> {
        let mut zip = ZipWriter::new(File::create(out_path)?);
        Self::pack_entries(&mut zip, config, entries)?;
        zip.finish()?;
        Ok(())
    }

    /// Package an explicit entry list into memory.
    pub fn write_entries_to_memory(
        config: &ArchiveConfig,
        entries: Vec<ArchiveEntry>,
    ) -> Result<Vec<u8>, ArchiveError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        Self::pack_entries(&mut zip, config, entries)?;
        Ok(zip.finish()?.into_inner())
    }

    fn pack_dir<W: Write + Seek>(
        zip: &mut ZipWriter<W>,
        config: &ArchiveConfig,
        source_dir: &Path,
    ) -> Result<(), ArchiveError> {
        let files = collect_files(source_dir)?;
        let languages =
            config.find_source_languages(files.iter().map(|(_, rel)| rel.as_str()));

        let has_manifest = files.iter().any(|(_, rel)| rel == MANIFEST_ENTRY_NAME);
        let sources = if has_manifest {
            // A user-supplied manifest is trusted verbatim; its own file is
            // packaged below with the rest of the tree.
            let manifest = fs::read(source_dir.join(MANIFEST_ENTRY_NAME))?;
            parse_parts(&manifest)?
                .into_iter()
                .map(|part| part.source().to_string())
                .collect()
        } else {
            config.language_modules(&languages)
        };

        for source in &sources {
            if !is_rooted(source) && !source_dir.join(source).is_file() {
                return Err(ArchiveError::MissingModule(source.clone()));
            }
        }

        if !has_manifest {
            let manifest = config.manifest_template().generate(&sources)?;
            write_entry_bytes(zip, MANIFEST_ENTRY_NAME, manifest.as_bytes())?;
        }

        let has_languages_file = files.iter().any(|(_, rel)| rel == LANGUAGES_ENTRY_NAME);
        if !has_languages_file {
            write_languages_config(zip, &languages)?;
        }

        for (path, rel) in &files {
            zip.start_file(rel.as_str(), SimpleFileOptions::default())?;
            let mut file = File::open(path)?;
            io::copy(&mut file, zip)?;
        }

        Ok(())
    }

    fn pack_entries<W: Write + Seek>(
        zip: &mut ZipWriter<W>,
        config: &ArchiveConfig,
        entries: Vec<ArchiveEntry>,
    ) -> Result<(), ArchiveError> {
        let names: Vec<String> = entries.iter().map(|e| e.name().to_string()).collect();
        let languages = config.find_source_languages(names.iter().map(String::as_str));

        if !names.iter().any(|n| n == MANIFEST_ENTRY_NAME) {
            let sources = config.language_modules(&languages);
            let manifest = config.manifest_template().generate(&sources)?;
            write_entry_bytes(zip, MANIFEST_ENTRY_NAME, manifest.as_bytes())?;
        }

        if !names.iter().any(|n| n == LANGUAGES_ENTRY_NAME) {
            write_languages_config(zip, &languages)?;
        }

        for entry in entries {
            zip.start_file(entry.name().to_string(), SimpleFileOptions::default())?;
            let mut reader = entry.open()?;
            io::copy(&mut reader, zip)?;
        }

        Ok(())
    }
}

fn write_entry_bytes<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    bytes: &[u8],
) -> Result<(), ArchiveError> {
    zip.start_file(name, SimpleFileOptions::default())?;
    zip.write_all(bytes)?;
    Ok(())
}

/// Emit `languages.config` when at least one language declares a non-empty
/// runtime-context binding.
fn write_languages_config<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    languages: &[&LanguageInfo],
) -> Result<(), ArchiveError> {
    if !languages.iter().any(|l| !l.language_context().is_empty()) {
        return Ok(());
    }

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Start(BytesStart::new("Languages")))?;
    for language in languages {
        let mut element = BytesStart::new("Language");
        element.push_attribute(("languageContext", language.language_context()));
        element.push_attribute(("module", language.context_module_name().unwrap_or_default()));
        element.push_attribute(("extensions", language.extensions_string().as_str()));
        writer.write_event(Event::Empty(element))?;
    }
    writer.write_event(Event::End(quick_xml::events::BytesEnd::new("Languages")))?;

    let document = writer.into_inner().into_inner();
    write_entry_bytes(zip, LANGUAGES_ENTRY_NAME, &document)
}

/// Files under a directory tree as `(absolute path, forward-slash relative
/// path)` pairs, sorted by relative path.
fn collect_files(dir: &Path) -> io::Result<Vec<(PathBuf, String)>> {
    fn visit(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, String)>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                visit(root, &path, out)?;
            } else if path.is_file() {
                let rel = path
                    .strip_prefix(root)
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push((path, rel));
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    visit(dir, dir, &mut files)?;
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}
