pub mod compress;
pub mod hash;
pub mod summary;
pub mod workdir;
