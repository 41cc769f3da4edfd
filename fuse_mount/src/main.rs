use std::env;
use std::fs::OpenOptions;
use std::sync::Arc;

use chainfs::block_device::file_device::FileDevice;
use chainfs::config::IMAGE_SIZE;
use chainfs::fuse_impl::FuseFs;
use chainfs::manager::device::ChainFs;
use fuser::MountOption;
use log::info;

fn main() {
    env_logger::init();
    let image = env::args_os()
        .nth(1)
        .expect("usage: fuse_mount <image> <mountpoint>");
    let mountpoint = env::args_os()
        .nth(2)
        .expect("usage: fuse_mount <image> <mountpoint>");

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&image)
        .unwrap();
    let fresh = file.metadata().unwrap().len() == 0;
    file.set_len(IMAGE_SIZE).unwrap();

    let fs = ChainFs::new(Arc::new(FileDevice::new(file)));
    if fresh {
        info!("formatting fresh image {:?}", image);
        fs.mkfs();
    }

    let options = vec![
        MountOption::RW,
        MountOption::FSName("chainfs".to_string()),
        MountOption::AutoUnmount,
    ];
    info!("mounting on {:?}", mountpoint);
    fuser::mount2(FuseFs::new(fs), &mountpoint, &options).unwrap();
}
