//! Package manifest generation and parsing
//!
//! The manifest is an XML document whose `Deployment.Parts` element lists
//! one `Part` child per closure member, each carrying a `Source` attribute
//! with the part's relative path. Generation goes through the
//! [`ManifestGenerator`] seam so embedders can supply their own templating;
//! two implementations ship here, a plain generator and one seeded from a
//! configured template document.

use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use super::ArchiveError;
use crate::part::ModulePart;

/// Name of the required manifest entry inside a package.
pub const MANIFEST_ENTRY_NAME: &str = "manifest";

/// Name of the optional language bindings entry inside a package.
pub const LANGUAGES_ENTRY_NAME: &str = "languages.config";

const PARTS_ELEMENT: &[u8] = b"Deployment.Parts";
const PART_ELEMENT: &[u8] = b"Part";
const SOURCE_ATTRIBUTE: &[u8] = b"Source";

/// Produces the manifest document for a set of part sources.
pub trait ManifestGenerator: Send + Sync {
    fn generate(&self, sources: &[String]) -> Result<String, ArchiveError>;
}

/// Default manifest generator: a minimal `Deployment` document.
pub struct PartsManifestTemplate;

impl ManifestGenerator for PartsManifestTemplate {
    fn generate(&self, sources: &[String]) -> Result<String, ArchiveError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer.write_event(Event::Start(BytesStart::new("Deployment")))?;
        writer.write_event(Event::Start(BytesStart::new("Deployment.Parts")))?;
        write_parts(&mut writer, sources)?;
        writer.write_event(Event::End(BytesEnd::new("Deployment.Parts")))?;
        writer.write_event(Event::End(BytesEnd::new("Deployment")))?;
        document_string(writer)
    }
}

/// Manifest generator seeded from a template document. Parts are injected
/// into the template's `Deployment.Parts` element, everything else is
/// emitted verbatim.
pub struct ConfigManifestTemplate {
    template: String,
}

impl ConfigManifestTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, ArchiveError> {
        let template = template.into();
        if count_parts_elements(&template)? != 1 {
            return Err(ArchiveError::InvalidManifest(
                "manifest template requires exactly one Deployment.Parts element".to_string(),
            ));
        }
        Ok(Self { template })
    }
}

impl ManifestGenerator for ConfigManifestTemplate {
    fn generate(&self, sources: &[String]) -> Result<String, ArchiveError> {
        let mut reader = Reader::from_str(&self.template);
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Start(start) if start.name().as_ref() == PARTS_ELEMENT => {
                    writer.write_event(Event::Start(start.to_owned()))?;
                    write_parts(&mut writer, sources)?;
                }
                Event::Empty(start) if start.name().as_ref() == PARTS_ELEMENT => {
                    writer.write_event(Event::Start(start.to_owned()))?;
                    write_parts(&mut writer, sources)?;
                    writer.write_event(Event::End(BytesEnd::new("Deployment.Parts")))?;
                }
                event => writer.write_event(event)?,
            }
        }

        document_string(writer)
    }
}

/// Parse a manifest document into its ordered part list.
pub fn parse_parts(manifest: &[u8]) -> Result<Vec<ModulePart>, ArchiveError> {
    let text = std::str::from_utf8(manifest)
        .map_err(|e| ArchiveError::InvalidManifest(e.to_string()))?;

    let mut reader = Reader::from_str(text);
    let mut parts = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == PART_ELEMENT =>
            {
                if let Some(source) = source_attribute(&element)? {
                    parts.push(ModulePart::new(source));
                }
            }
            _ => {}
        }
    }

    Ok(parts)
}

fn source_attribute(element: &BytesStart<'_>) -> Result<Option<String>, ArchiveError> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| ArchiveError::InvalidManifest(e.to_string()))?;
        if attribute.key.as_ref() == SOURCE_ATTRIBUTE {
            let value = attribute
                .unescape_value()
                .map_err(|e| ArchiveError::InvalidManifest(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn write_parts(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    sources: &[String],
) -> Result<(), ArchiveError> {
    for source in sources {
        let mut part = BytesStart::new("Part");
        part.push_attribute(("Source", source.as_str()));
        writer.write_event(Event::Empty(part))?;
    }
    Ok(())
}

fn document_string(writer: Writer<Cursor<Vec<u8>>>) -> Result<String, ArchiveError> {
    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| ArchiveError::InvalidManifest(e.to_string()))
}

fn count_parts_elements(template: &str) -> Result<usize, ArchiveError> {
    let mut reader = Reader::from_str(template);
    let mut count = 0;
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == PARTS_ELEMENT => count += 1,
            _ => {}
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_manifest_round_trips() {
        let sources = vec!["moduleA.bin".to_string(), "sub/moduleB.bin".to_string()];
        let manifest = PartsManifestTemplate
            .generate(&sources)
            .expect("generate manifest");

        let parts = parse_parts(manifest.as_bytes()).expect("parse manifest");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].source(), "moduleA.bin");
        assert_eq!(parts[1].source(), "sub/moduleB.bin");
    }

    #[test]
    fn template_generator_preserves_surrounding_document() {
        let template = ConfigManifestTemplate::new(
            "<Deployment Version=\"2\"><Deployment.Parts/></Deployment>",
        )
        .expect("valid template");

        let manifest = template
            .generate(&["moduleA.bin".to_string()])
            .expect("generate manifest");
        assert!(manifest.contains("Version=\"2\""));

        let parts = parse_parts(manifest.as_bytes()).expect("parse manifest");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].source(), "moduleA.bin");
    }

    #[test]
    fn template_without_parts_element_is_rejected() {
        assert!(ConfigManifestTemplate::new("<Deployment/>").is_err());
    }

    #[test]
    fn parse_tolerates_backslash_sources() {
        let manifest = "<Deployment><Deployment.Parts>\
            <Part Source=\"sub\\moduleA.bin\"/>\
            </Deployment.Parts></Deployment>";
        let parts = parse_parts(manifest.as_bytes()).expect("parse manifest");
        assert_eq!(parts[0].source(), "sub/moduleA.bin");
    }

    #[test]
    fn parse_skips_parts_without_source() {
        let manifest = "<Deployment><Deployment.Parts>\
            <Part/><Part Source=\"a.bin\"/>\
            </Deployment.Parts></Deployment>";
        let parts = parse_parts(manifest.as_bytes()).expect("parse manifest");
        assert_eq!(parts.len(), 1);
    }
}
