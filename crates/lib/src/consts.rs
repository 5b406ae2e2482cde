/// Length of the truncated hash used in object file names.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// File that marks a directory as a component.
pub const COMPONENT_DEF_FILE: &str = "Component.cdef";

pub const DEFAULT_TARGET: &str = "localhost";
pub const DEFAULT_WORKING_DIR: &str = "_build";

/// Where binary app archives are unpacked, relative to the working directory.
pub const BIN_APPS_DIR: &str = "binApps";

/// Environment variables read by `BuildParams::from_env`.
pub const FRAMEWORK_ROOT_ENV: &str = "FRAMEWORK_ROOT";
pub const FRAMEWORK_TARGET_ENV: &str = "FRAMEWORK_TARGET";

/// Framework libraries every component links against, under the framework lib dir.
pub const FRAMEWORK_C_LIB: &str = "libframework.so";
pub const FRAMEWORK_JAVA_LIB: &str = "framework.jar";
