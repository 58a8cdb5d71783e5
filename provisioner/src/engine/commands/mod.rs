//! The provisioning command set

mod cleanup;
mod copy_data;
mod extract_package;
mod fetch_device_info;
mod fetch_package;
mod flash_os;
mod install_package;
mod resolve_os_target;
mod resolve_package;
mod restart_app;
mod upload_payload;

pub use cleanup::CleanupCommand;
pub use copy_data::CopyDataCommand;
pub use extract_package::ExtractPackageCommand;
pub use fetch_device_info::FetchDeviceInfoCommand;
pub use fetch_package::FetchPackageCommand;
pub use flash_os::FlashOsCommand;
pub use install_package::InstallPackageCommand;
pub use resolve_os_target::ResolveOsTargetCommand;
pub use resolve_package::ResolvePackageCommand;
pub use restart_app::RestartAppCommand;
pub use upload_payload::UploadPayloadCommand;
