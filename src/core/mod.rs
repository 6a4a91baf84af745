// ─── CTLauncher Core ───
// Version acquisition and launch preparation.
//
// Architecture:
//   core/
//     version/     Version index, descriptors, platform rules, libraries
//     downloader/  Verified, retried, pooled artifact downloads
//     assets/      Asset index + content-addressed object store
//     launch/      Classpath, natives, argument templates, coordinator
//     java/        Runtime lookup by required major version
//     auth/        Offline identity
//     maven/       Coordinate parsing for library paths
//     state/       Configuration and on-disk layout

pub mod assets;
pub mod auth;
pub mod downloader;
pub mod error;
pub mod http;
pub mod java;
pub mod launch;
pub mod maven;
pub mod platform;
pub mod state;
pub mod version;
