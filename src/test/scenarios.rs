//! End-to-end behavior from generated assemblies through sessions and the worker.

use std::{fs, path::Path, sync::Arc, thread, time::Duration};

use tokio::io::{duplex, AsyncWriteExt, BufReader};

use crate::{
    layout::{Entry, Platform},
    protocol::{decode_response, read_frame, ExitReason, Worker, WorkerConfig},
    session::{AnalysisTarget, SessionKey, SessionRegistry},
    test::{element, write_assembly, FieldSpec, ImageBuilder, TypeSpecBuilder},
    typesystem::LayoutKind,
};

fn key(directory: &Path) -> SessionKey {
    SessionKey::new(
        AnalysisTarget::Assembly(directory.to_path_buf()),
        Platform::X64,
    )
}

fn reversed_pair() -> ImageBuilder {
    ImageBuilder::new().assembly("Sample").type_def(
        TypeSpecBuilder::value_type("Sample", "Reversed")
            .explicit()
            .field(FieldSpec::public("Second", &[element::I4]).offset(4))
            .field(FieldSpec::public("First", &[element::I4]).offset(0)),
    )
}

#[test]
fn fields_are_reported_by_offset() {
    let output = tempfile::tempdir().unwrap();
    write_assembly(output.path(), "Sample", &reversed_pair());

    let registry = SessionRegistry::new();
    let session = registry.get_or_open(&key(output.path())).unwrap();
    let layout = session
        .load_and_analyze("Sample", "Sample.Reversed")
        .unwrap()
        .unwrap();

    let fields: Vec<(i32, &str)> = layout
        .fields
        .iter()
        .map(|field| (field.offset, field.type_and_name.value()))
        .collect();
    assert_eq!(fields, vec![(0, "int First"), (4, "int Second")]);
    assert_eq!(layout.total_size, 8);
    assert_eq!(layout.total_padding, 0);
    assert_eq!(layout.attribute_kind, LayoutKind::Explicit);
    assert!(layout.is_value_type);
}

#[test]
fn overlapping_class_fields() {
    let output = tempfile::tempdir().unwrap();
    let mut union = TypeSpecBuilder::class("Sample", "Union")
        .explicit()
        .class_layout(0, 16);
    for index in 0..6 {
        union = union.field(FieldSpec::public(&format!("Alias{index}"), &[element::I4]).offset(0));
    }
    union = union.field(FieldSpec::public("Tail", &[element::I4]).offset(8));
    write_assembly(
        output.path(),
        "Sample",
        &ImageBuilder::new().assembly("Sample").type_def(union),
    );

    let registry = SessionRegistry::new();
    let session = registry.get_or_open(&key(output.path())).unwrap();
    let layout = session
        .load_and_analyze("Sample", "Sample.Union")
        .unwrap()
        .unwrap();

    // Header and method table pointer plus the 16 declared bytes of field data
    assert_eq!(layout.total_size, 32);
    assert_eq!(layout.attribute_size, 16);
    assert_eq!(layout.fields.len(), 7);
    assert_eq!(layout.total_padding, 32 - 8);

    let rows = layout.fields_with_paddings();
    assert_eq!(rows.iter().filter(|row| row.overlaps).count(), 5);
    assert!(rows.iter().all(|row| row.size() > 0));
    assert!(matches!(rows.last().unwrap().entry, Entry::Padding(_)));
}

#[tokio::test]
async fn malformed_request_keeps_worker_alive() {
    let output = tempfile::tempdir().unwrap();
    write_assembly(output.path(), "Sample", &reversed_pair());
    let worker = Worker::new(WorkerConfig::default());

    let (client, server) = duplex(64 * 1024);
    let lines = format!(
        "Sample.Reversed,Sample\n{}|Sample.Reversed,Sample\n",
        output.path().display()
    );
    let client = async move {
        let (reader, mut writer) = tokio::io::split(client);
        let mut reader = BufReader::new(reader);
        writer.write_all(lines.as_bytes()).await.unwrap();

        let malformed = read_frame(&mut reader).await.unwrap();
        let answered = read_frame(&mut reader).await.unwrap();
        writer.shutdown().await.unwrap();
        (malformed, answered)
    };

    let (reason, (malformed, answered)) = tokio::join!(worker.serve(server), client);
    assert_eq!(reason.unwrap(), ExitReason::Disconnected);
    assert!(decode_response(&malformed).unwrap().is_none());
    let layout = decode_response(&answered).unwrap().unwrap();
    assert_eq!(layout.total_size, 8);
}

#[test]
fn rebuild_replaces_session() {
    let output = tempfile::tempdir().unwrap();
    write_assembly(output.path(), "Sample", &reversed_pair());

    let registry = SessionRegistry::new();
    let first = registry.get_or_open(&key(output.path())).unwrap();
    let before = first
        .load_and_analyze("Sample", "Sample.Reversed")
        .unwrap()
        .unwrap();
    assert_eq!(before.total_size, 8);
    let first_context = first.context_handle();
    let first_copy = first.workspace().to_path_buf();

    let rebuilt = ImageBuilder::new().assembly("Sample").type_def(
        TypeSpecBuilder::value_type("Sample", "Reversed")
            .explicit()
            .field(FieldSpec::public("Second", &[element::I4]).offset(4))
            .field(FieldSpec::public("First", &[element::I4]).offset(0))
            .field(FieldSpec::public("Third", &[element::I8]).offset(8)),
    );
    fs::write(output.path().join("Sample.dll"), rebuilt.build()).unwrap();

    for _ in 0..100 {
        if first.is_invalidated() {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }
    assert!(first.is_invalidated());

    let second = registry.get_or_open(&key(output.path())).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_ne!(second.workspace(), first_copy.as_path());

    let after = second
        .load_and_analyze("Sample", "Sample.Reversed")
        .unwrap()
        .unwrap();
    assert_eq!(after.total_size, 16);
    assert_eq!(after.fields.len(), 3);

    drop(first);
    assert!(first_context.upgrade().is_none());
    assert!(!first_copy.exists());
}
