pub const VK_NULL_HANDLE: u64 = 0;
pub const UINT64_MAX: u64 = !0;

pub const fn vk_make_version(major: u32, minor: u32, patch: u32) -> u32 {
    (major << 22) | (minor << 12) | patch
}

pub const fn vk_version_major(version: u32) -> u32 {
    version >> 22
}

pub const fn vk_version_minor(version: u32) -> u32 {
    (version >> 12) & 0x3ff
}

pub const fn vk_version_patch(version: u32) -> u32 {
    version & 0xfff
}

pub const VK_API_VERSION: u32 = vk_make_version(1, 0, 0);
pub const VK_API_VERSION_1_0: u32 = vk_make_version(1, 0, 0);
