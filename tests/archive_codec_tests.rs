//! Tests for the package archive codec (build, read, module loading)

mod support;

use std::fs::File;
use std::io::Write;
use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use modpack::archive::{ConfigManifestTemplate, PartsManifestTemplate};
use modpack::{
    ArchiveBuilder, ArchiveConfig, ArchiveEntry, ArchiveError, LanguageInfo, ModuleOrigin,
    ModulePart, PackageArchive,
};

use support::{stub_manager, write_corrupt_module, write_module};

fn bin_config(modules: Vec<String>, language_context: &str) -> ArchiveConfig {
    ArchiveConfig::new(
        Arc::new(PartsManifestTemplate),
        vec![LanguageInfo::new(
            vec![".bin".to_string()],
            modules,
            language_context,
        )],
        None,
    )
}

// ===== Build / read round trip =====

#[test]
fn test_entries_build_round_trips_manifest() {
    let temp_dir = TempDir::new().unwrap();
    let module_a = write_module(temp_dir.path(), "moduleA", &[]);
    let module_b = write_module(temp_dir.path(), "moduleB", &[]);

    let config = bin_config(
        vec!["moduleA.bin".to_string(), "moduleB.bin".to_string()],
        "",
    );
    let entries = vec![
        ArchiveEntry::from_file("moduleA.bin", module_a),
        ArchiveEntry::from_file("moduleB.bin", module_b),
    ];

    let out_path = temp_dir.path().join("package.xap");
    ArchiveBuilder::write_entries_to_file(&config, entries, &out_path).unwrap();

    let parts = PackageArchive::deployment_parts(File::open(&out_path).unwrap()).unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].source(), "moduleA.bin");
    assert_eq!(parts[1].source(), "moduleB.bin");
}

#[test]
fn test_dir_build_trusts_existing_manifest_verbatim() {
    let temp_dir = TempDir::new().unwrap();
    write_module(temp_dir.path(), "moduleA", &[]);
    write_module(temp_dir.path(), "moduleB", &[]);

    // Manifest listing the modules in reverse order; the generator would
    // have listed moduleA first.
    std::fs::write(
        temp_dir.path().join("manifest"),
        "<Deployment><Deployment.Parts>\
         <Part Source=\"moduleB.bin\"/><Part Source=\"moduleA.bin\"/>\
         </Deployment.Parts></Deployment>",
    )
    .unwrap();

    let config = bin_config(vec!["moduleA.bin".to_string()], "");
    let out_dir = TempDir::new().unwrap();
    let out_path = out_dir.path().join("package.xap");
    ArchiveBuilder::write_dir_to_file(&config, temp_dir.path(), &out_path).unwrap();

    let parts = PackageArchive::deployment_parts(File::open(&out_path).unwrap()).unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].source(), "moduleB.bin");
    assert_eq!(parts[1].source(), "moduleA.bin");
}

#[test]
fn test_dir_build_fails_on_missing_manifest_module() {
    let temp_dir = TempDir::new().unwrap();
    write_module(temp_dir.path(), "moduleA", &[]);
    std::fs::write(
        temp_dir.path().join("manifest"),
        "<Deployment><Deployment.Parts>\
         <Part Source=\"missing.bin\"/>\
         </Deployment.Parts></Deployment>",
    )
    .unwrap();

    let config = bin_config(Vec::new(), "");
    let out_dir = TempDir::new().unwrap();
    let result =
        ArchiveBuilder::write_dir_to_file(&config, temp_dir.path(), &out_dir.path().join("p.xap"));
    assert!(matches!(result, Err(ArchiveError::MissingModule(_))));
}

#[test]
fn test_manifest_missing_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bare.xap");

    // Raw archive without a manifest entry.
    let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
    zip.start_file("payload.bin", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"module payload\n").unwrap();
    zip.finish().unwrap();

    let result = PackageArchive::deployment_parts(File::open(&path).unwrap());
    assert!(matches!(result, Err(ArchiveError::ManifestMissing)));
}

// ===== languages.config =====

#[test]
fn test_languages_config_emitted_for_context_bound_language() {
    let temp_dir = TempDir::new().unwrap();
    let module_a = write_module(temp_dir.path(), "moduleA", &[]);

    let config = bin_config(vec!["moduleA.bin".to_string()], "script-runtime");
    let bytes = ArchiveBuilder::write_entries_to_memory(
        &config,
        vec![ArchiveEntry::from_file("moduleA.bin", module_a)],
    )
    .unwrap();

    let languages = PackageArchive::entry_bytes(
        std::io::Cursor::new(bytes),
        &ModulePart::new("languages.config"),
    )
    .unwrap()
    .expect("languages.config entry");

    let text = String::from_utf8(languages).unwrap();
    assert!(text.contains("languageContext=\"script-runtime\""));
    assert!(text.contains("module=\"moduleA.bin\""));
    assert!(text.contains("extensions=\"bin,.bin\""));
}

#[test]
fn test_languages_config_absent_without_context_binding() {
    let temp_dir = TempDir::new().unwrap();
    let module_a = write_module(temp_dir.path(), "moduleA", &[]);

    let config = bin_config(vec!["moduleA.bin".to_string()], "");
    let bytes = ArchiveBuilder::write_entries_to_memory(
        &config,
        vec![ArchiveEntry::from_file("moduleA.bin", module_a)],
    )
    .unwrap();

    let languages = PackageArchive::entry_bytes(
        std::io::Cursor::new(bytes),
        &ModulePart::new("languages.config"),
    )
    .unwrap();
    assert!(languages.is_none());
}

// ===== Entry access and extraction =====

#[test]
fn test_entry_bytes_matches_exact_source_name() {
    let temp_dir = TempDir::new().unwrap();
    let module_a = write_module(temp_dir.path(), "moduleA", &[]);

    let config = bin_config(vec!["moduleA.bin".to_string()], "");
    let bytes = ArchiveBuilder::write_entries_to_memory(
        &config,
        vec![ArchiveEntry::from_file("moduleA.bin", module_a)],
    )
    .unwrap();

    let found = PackageArchive::entry_bytes(
        std::io::Cursor::new(bytes.clone()),
        &ModulePart::new("moduleA.bin"),
    )
    .unwrap();
    assert!(found.is_some());

    let absent = PackageArchive::entry_bytes(
        std::io::Cursor::new(bytes),
        &ModulePart::new("missing.bin"),
    )
    .unwrap();
    assert!(absent.is_none());
}

#[test]
fn test_extraction_directory_is_reused_across_loads() {
    let temp_dir = TempDir::new().unwrap();
    let module_a = write_module(temp_dir.path(), "moduleA", &[]);

    let config = bin_config(vec!["moduleA.bin".to_string()], "");
    let bytes = ArchiveBuilder::write_entries_to_memory(
        &config,
        vec![ArchiveEntry::from_file("moduleA.bin", module_a)],
    )
    .unwrap();

    let out_dir = TempDir::new().unwrap();
    PackageArchive::extract_files(std::io::Cursor::new(bytes.clone()), out_dir.path(), false)
        .unwrap();
    assert!(out_dir.path().join("moduleA.bin").is_file());

    // Second extraction over existing files must not fail.
    PackageArchive::extract_files(std::io::Cursor::new(bytes), out_dir.path(), false).unwrap();
}

// ===== Module loading =====

#[test]
fn test_load_packaged_modules_from_extraction_directory() {
    let temp_dir = TempDir::new().unwrap();
    let module_a = write_module(temp_dir.path(), "moduleA", &[]);
    let module_b = write_module(temp_dir.path(), "moduleB", &["moduleA"]);

    let config = bin_config(
        vec!["moduleA.bin".to_string(), "moduleB.bin".to_string()],
        "",
    );
    let repository_dir = TempDir::new().unwrap();
    let uid = Uuid::new_v4();
    let package_path = repository_dir.path().join(format!("{uid}.xap"));
    ArchiveBuilder::write_entries_to_file(
        &config,
        vec![
            ArchiveEntry::from_file("moduleA.bin", module_a),
            ArchiveEntry::from_file("moduleB.bin", module_b),
        ],
        &package_path,
    )
    .unwrap();

    let (host, manager) = stub_manager();
    let (modules, aggregate) = PackageArchive::load_packaged_modules(
        &manager,
        Some(repository_dir.path()),
        uid,
        &package_path,
    )
    .unwrap();

    assert!(aggregate.is_none());
    assert_eq!(modules.len(), 2);
    assert_eq!(host.loaded_count(), 2);
    assert!(matches!(modules[0].1.origin(), ModuleOrigin::File(_)));

    // Durable extraction directory exists next to the package file.
    assert!(repository_dir
        .path()
        .join(uid.to_string())
        .join("moduleA.bin")
        .is_file());

    // The closure-scoped resolver is uninstalled after the load.
    assert_eq!(manager.installed_count(), 0);
}

#[test]
fn test_load_packaged_modules_in_memory_without_repository_directory() {
    let temp_dir = TempDir::new().unwrap();
    let module_a = write_module(temp_dir.path(), "moduleA", &[]);

    let config = bin_config(vec!["moduleA.bin".to_string()], "");
    let package_path = temp_dir.path().join("package.xap");
    ArchiveBuilder::write_entries_to_file(
        &config,
        vec![ArchiveEntry::from_file("moduleA.bin", module_a)],
        &package_path,
    )
    .unwrap();

    let (_host, manager) = stub_manager();
    let (modules, aggregate) =
        PackageArchive::load_packaged_modules(&manager, None, Uuid::new_v4(), &package_path)
            .unwrap();

    assert!(aggregate.is_none());
    assert_eq!(modules.len(), 1);
    assert!(matches!(modules[0].1.origin(), ModuleOrigin::Memory));
}

#[test]
fn test_per_part_failures_aggregate_and_loading_continues() {
    let temp_dir = TempDir::new().unwrap();
    let module_a = write_module(temp_dir.path(), "moduleA", &[]);
    let broken = write_corrupt_module(temp_dir.path(), "moduleX");

    let config = bin_config(
        vec!["moduleA.bin".to_string(), "moduleX.bin".to_string()],
        "",
    );
    let repository_dir = TempDir::new().unwrap();
    let uid = Uuid::new_v4();
    let package_path = repository_dir.path().join(format!("{uid}.xap"));
    ArchiveBuilder::write_entries_to_file(
        &config,
        vec![
            ArchiveEntry::from_file("moduleA.bin", module_a),
            ArchiveEntry::from_file("moduleX.bin", broken),
        ],
        &package_path,
    )
    .unwrap();

    let (_host, manager) = stub_manager();
    let (modules, aggregate) = PackageArchive::load_packaged_modules(
        &manager,
        Some(repository_dir.path()),
        uid,
        &package_path,
    )
    .unwrap();

    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].0.source(), "moduleA.bin");

    let aggregate = aggregate.expect("aggregated load failure");
    assert_eq!(aggregate.errors.len(), 1);
    assert_eq!(aggregate.errors[0].part.source(), "moduleX.bin");

    // Uninstalled on the failure path too.
    assert_eq!(manager.installed_count(), 0);
}

// ===== Manifest templates =====

#[test]
fn test_config_manifest_template_used_by_builder() {
    let temp_dir = TempDir::new().unwrap();
    let module_a = write_module(temp_dir.path(), "moduleA", &[]);

    let template = ConfigManifestTemplate::new(
        "<Deployment EntryPoint=\"main\"><Deployment.Parts/></Deployment>",
    )
    .unwrap();
    let config = ArchiveConfig::new(
        Arc::new(template),
        vec![LanguageInfo::new(
            vec![".bin".to_string()],
            vec!["moduleA.bin".to_string()],
            "",
        )],
        None,
    );

    let bytes = ArchiveBuilder::write_entries_to_memory(
        &config,
        vec![ArchiveEntry::from_file("moduleA.bin", module_a)],
    )
    .unwrap();

    let manifest =
        PackageArchive::entry_bytes(std::io::Cursor::new(bytes), &ModulePart::new("manifest"))
            .unwrap()
            .expect("manifest entry");
    let text = String::from_utf8(manifest).unwrap();
    assert!(text.contains("EntryPoint=\"main\""));
    assert!(text.contains("Source=\"moduleA.bin\""));
}
