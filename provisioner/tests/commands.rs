//! Command behavior tests: idempotence, staging, flash skip

mod common;

use std::sync::Arc;

use dutprov::config::ProvisionConfig;
use dutprov::engine::command::ProvisionCommand;
use dutprov::engine::commands::{
    CopyDataCommand, ExtractPackageCommand, FetchPackageCommand, FlashOsCommand,
    ResolveOsTargetCommand, UploadPayloadCommand,
};
use dutprov::errors::ProvisionError;
use dutprov::models::response::OsBuildInfo;
use dutprov::registry::PackageDescription;
use dutprov::service::context::{
    AndroidPackage, ProvisionContext, ResolvedImage, ResolvedPackage,
};

use common::{fast_config, make_context, make_zip, request_from_json, FakeRegistry, FakeRemote, FakeStore};

const APK_NAME: &str = "coresvc_prodsc_arm64_alldpi_release.apk";

fn build_info(id: &str) -> OsBuildInfo {
    OsBuildInfo {
        id: id.to_string(),
        os_version: "12".to_string(),
        incremental_version: "1234567890".to_string(),
    }
}

fn resolved_package(version_code: &str) -> ResolvedPackage {
    ResolvedPackage {
        registry_name: "thirdparty/coresvc/coresvc_prodsc_arm64_alldpi_release_apk".to_string(),
        instance_id: "inst-1".to_string(),
        version_code: version_code.to_string(),
        archive_path: None,
    }
}

fn package_context() -> (ProvisionContext, Arc<FakeRemote>) {
    let remote = Arc::new(FakeRemote::new());
    let ctx = make_context(
        request_from_json(
            r#"{"device": {"serial_number": "SN1"}, "packages": [{"kind": "core-service"}]}"#,
        ),
        remote.clone(),
    );
    (ctx, remote)
}

// ================================ fetch =======================================

#[tokio::test]
async fn test_fetch_skips_when_installed_version_matches() {
    let (mut ctx, _remote) = package_context();
    ctx.packages[0].resolved = Some(resolved_package("100"));
    ctx.packages[0].android_package = Some(AndroidPackage {
        package_name: "com.lab.coreservice".to_string(),
        version_code: "100".to_string(),
        updated_version_code: String::new(),
    });
    let registry = Arc::new(FakeRegistry::new());

    FetchPackageCommand::new(registry.clone())
        .execute(&mut ctx)
        .await
        .unwrap();

    // Same version installed: zero transfers, nothing staged.
    assert_eq!(registry.fetch_count(), 0);
    assert!(ctx.packages[0].resolved.as_ref().unwrap().archive_path.is_none());
}

#[tokio::test]
async fn test_fetch_downloads_once_and_reuses_workspace() {
    let (mut ctx, _remote) = package_context();
    ctx.workspace.setup().await.unwrap();
    ctx.packages[0].resolved = Some(resolved_package("101"));
    ctx.packages[0].android_package = Some(AndroidPackage {
        package_name: "com.lab.coreservice".to_string(),
        version_code: "100".to_string(),
        updated_version_code: String::new(),
    });
    let registry = Arc::new(FakeRegistry::new());
    registry.archive_bytes(make_zip(&[(APK_NAME, b"apk-bytes")]));

    FetchPackageCommand::new(registry.clone())
        .execute(&mut ctx)
        .await
        .unwrap();
    assert_eq!(registry.fetch_count(), 1);
    let archive = ctx.packages[0]
        .resolved
        .as_ref()
        .unwrap()
        .archive_path
        .clone()
        .unwrap();
    assert!(archive.exists());

    // A second run over the same workspace finds the archive and does not
    // transfer again.
    FetchPackageCommand::new(registry.clone())
        .execute(&mut ctx)
        .await
        .unwrap();
    assert_eq!(registry.fetch_count(), 1);

    ctx.workspace.remove().await.unwrap();
}

// =============================== extract ======================================

#[tokio::test]
async fn test_extract_runs_exactly_once_per_instance() {
    let (mut ctx, _remote) = package_context();
    ctx.workspace.setup().await.unwrap();
    let archive_file = ctx.workspace.archive_file("inst-1");
    std::fs::write(archive_file.path(), make_zip(&[(APK_NAME, b"apk-bytes")])).unwrap();

    let mut resolved = resolved_package("101");
    resolved.archive_path = Some(archive_file.path().to_path_buf());
    ctx.packages[0].resolved = Some(resolved);

    ExtractPackageCommand::new().execute(&mut ctx).await.unwrap();
    let payload = ctx.workspace.payload_dir("inst-1").file(APK_NAME);
    assert!(payload.exists().await);

    // Remove the payload and run again: the destination-exists check skips
    // the unzip, so the file stays gone.
    std::fs::remove_file(payload.path()).unwrap();
    ExtractPackageCommand::new().execute(&mut ctx).await.unwrap();
    assert!(!payload.exists().await);

    ctx.workspace.remove().await.unwrap();
}

// ================================ upload ======================================

#[tokio::test]
async fn test_upload_caches_payload_under_instance_key() {
    let (mut ctx, _remote) = package_context();
    ctx.workspace.setup().await.unwrap();
    ctx.os.build_info = Some(build_info("99"));
    ctx.packages[0].resolved = Some(resolved_package("101"));
    let payload_dir = ctx.workspace.payload_dir("inst-1");
    payload_dir.create().await.unwrap();
    payload_dir.file(APK_NAME).write_string("apk").await.unwrap();

    let store = Arc::new(FakeStore::new());
    UploadPayloadCommand::new(store.clone(), Arc::new(ProvisionConfig::default()))
        .execute(&mut ctx)
        .await
        .unwrap();

    assert_eq!(
        store.uploads.lock().unwrap().as_slice(),
        &[format!("inst-1/{APK_NAME}")]
    );
    let payload = ctx.packages[0].payload.as_ref().unwrap();
    assert_eq!(payload.name, APK_NAME);
    assert_eq!(payload.storage_key.as_deref(), Some(&*format!("inst-1/{APK_NAME}")));

    ctx.workspace.remove().await.unwrap();
}

#[tokio::test]
async fn test_upload_fails_distinctly_when_payload_missing() {
    let (mut ctx, _remote) = package_context();
    ctx.workspace.setup().await.unwrap();
    ctx.os.build_info = Some(build_info("99"));
    ctx.packages[0].resolved = Some(resolved_package("101"));
    // Payload dir exists but holds the wrong file.
    let payload_dir = ctx.workspace.payload_dir("inst-1");
    payload_dir.create().await.unwrap();
    payload_dir.file("other.apk.txt").write_string("x").await.unwrap();

    let store = Arc::new(FakeStore::new());
    let err = UploadPayloadCommand::new(store.clone(), Arc::new(ProvisionConfig::default()))
        .execute(&mut ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::StorageError(_)));
    assert_eq!(store.upload_count(), 0);

    ctx.workspace.remove().await.unwrap();
}

// =============================== resolve/flash ================================

fn os_context(current_build: &str) -> (ProvisionContext, Arc<FakeRemote>) {
    let remote = Arc::new(FakeRemote::new());
    let mut ctx = make_context(
        request_from_json(
            r#"{"device": {"serial_number": "SN1"}, "os_image": {"build_map": {"alpha": "100"}}}"#,
        ),
        remote.clone(),
    );
    ctx.dut.board = Some("alpha".to_string());
    ctx.os.build_info = Some(build_info(current_build));
    (ctx, remote)
}

#[tokio::test]
async fn test_resolve_clears_target_when_already_on_build() {
    let (mut ctx, _remote) = os_context("100");

    ResolveOsTargetCommand::new().execute(&mut ctx).await.unwrap();

    assert!(ctx.os.resolved.is_none());
    assert!(ctx.os.source.is_none());
}

#[tokio::test]
async fn test_resolve_sets_target_when_build_differs() {
    let (mut ctx, _remote) = os_context("99");

    ResolveOsTargetCommand::new().execute(&mut ctx).await.unwrap();

    let resolved = ctx.os.resolved.as_ref().unwrap();
    assert_eq!(resolved.build_id, "100");
    assert_eq!(resolved.storage_folder, "alpha/100");
}

#[tokio::test]
async fn test_resolve_unknown_board_is_an_error() {
    let (mut ctx, _remote) = os_context("99");
    ctx.dut.board = Some("omega".to_string());

    let err = ResolveOsTargetCommand::new()
        .execute(&mut ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::SpecError(_)));
}

#[tokio::test]
async fn test_flash_skips_entirely_when_no_target_resolved() {
    let (mut ctx, remote) = os_context("100");
    ResolveOsTargetCommand::new().execute(&mut ctx).await.unwrap();

    FlashOsCommand::new(Arc::new(fast_config()))
        .execute(&mut ctx)
        .await
        .unwrap();

    // No partition writes, no reboots, no build re-read.
    assert_eq!(remote.count_calls("fastboot"), 0);
    assert_eq!(remote.count_calls("reboot"), 0);
    assert!(ctx.os.updated_build_info.is_none());
}

// ================================ copy ========================================

#[tokio::test]
async fn test_copy_os_images_fans_out_over_filtered_set() {
    let (mut ctx, remote) = os_context("99");
    ctx.os.resolved = Some(ResolvedImage {
        build_id: "100".to_string(),
        storage_folder: "alpha/100".to_string(),
        files: Vec::new(),
        device_dir: None,
    });
    let store = Arc::new(FakeStore::new());
    store.listing(&[
        "bootloader.img",
        "checksums.txt",
        "radio.img",
        "alpha-img-100.zip",
    ]);

    CopyDataCommand::os_images(store.clone(), Arc::new(fast_config()))
        .execute(&mut ctx)
        .await
        .unwrap();

    assert_eq!(remote.count_calls("copy_data"), 3);
    let resolved = ctx.os.resolved.as_ref().unwrap();
    assert_eq!(
        resolved.files,
        vec!["bootloader.img", "radio.img", "alpha-img-100.zip"]
    );
    assert_eq!(
        resolved.device_dir.as_deref(),
        Some("/mnt/stateful_partition/android_provision/alpha/100")
    );
}

#[tokio::test]
async fn test_copy_os_images_incomplete_build_is_an_error() {
    let (mut ctx, remote) = os_context("99");
    ctx.os.resolved = Some(ResolvedImage {
        build_id: "100".to_string(),
        storage_folder: "alpha/100".to_string(),
        files: Vec::new(),
        device_dir: None,
    });
    let store = Arc::new(FakeStore::new());
    store.listing(&["bootloader.img", "radio.img"]);

    let err = CopyDataCommand::os_images(store, Arc::new(fast_config()))
        .execute(&mut ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::StorageError(_)));
    assert_eq!(remote.count_calls("copy_data"), 0);
}

#[tokio::test]
async fn test_copy_packages_stages_payload_on_host() {
    let (mut ctx, remote) = package_context();
    ctx.packages[0].resolved = Some(resolved_package("101"));
    ctx.packages[0].payload = Some(dutprov::service::context::PayloadFile {
        name: APK_NAME.to_string(),
        storage_key: Some(format!("inst-1/{APK_NAME}")),
        device_path: None,
    });
    let store = Arc::new(FakeStore::new());

    CopyDataCommand::packages(store)
        .execute(&mut ctx)
        .await
        .unwrap();

    let expected = format!("/tmp/inst-1/{APK_NAME}");
    assert_eq!(
        ctx.packages[0].payload.as_ref().unwrap().device_path.as_deref(),
        Some(expected.as_str())
    );
    assert_eq!(remote.count_calls(&expected), 1);
}

// =============================== registry resolve =============================

#[tokio::test]
async fn test_resolve_package_requires_version_code_tag() {
    let (mut ctx, _remote) = package_context();
    ctx.os.build_info = Some(build_info("99"));
    let registry = Arc::new(FakeRegistry::new());
    registry.describe_as(
        "thirdparty/coresvc/coresvc_prodsc_arm64_alldpi_release_apk",
        PackageDescription {
            package_name: "thirdparty/coresvc/coresvc_prodsc_arm64_alldpi_release_apk".to_string(),
            instance_id: "inst-1".to_string(),
            tags: vec!["build:42".to_string()],
        },
    );

    let err = dutprov::engine::commands::ResolvePackageCommand::new(
        registry,
        Arc::new(ProvisionConfig::default()),
    )
    .execute(&mut ctx)
    .await
    .unwrap_err();

    assert!(matches!(err, ProvisionError::RegistryError(_)));
    assert!(ctx.packages[0].resolved.is_none());
}
