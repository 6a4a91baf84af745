mod asset_index;

pub use asset_index::{AssetIndex, AssetObject, AssetSynchronizer, SyncReport};
