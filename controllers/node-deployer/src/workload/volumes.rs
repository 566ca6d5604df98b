//! Volume and mount constructors shared by the drivers.

use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, EmptyDirVolumeSource, KeyToPath, PersistentVolumeClaimVolumeSource,
    SecretVolumeSource, Volume, VolumeMount,
};

/// Volume projecting a ConfigMap, optionally narrowed to items
pub fn config_map(volume: &str, config_map: &str, items: Vec<KeyToPath>, default_mode: Option<i32>) -> Volume {
    Volume {
        name: volume.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map.to_string().into(),
            items: (!items.is_empty()).then_some(items),
            default_mode,
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Volume projecting selected keys of a secret
pub fn secret(volume: &str, secret: &str, items: Vec<KeyToPath>) -> Volume {
    Volume {
        name: volume.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret.to_string()),
            items: Some(items),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Scratch volume, e.g. `HugePages`
pub fn empty_dir(volume: &str, medium: &str) -> Volume {
    Volume {
        name: volume.to_string(),
        empty_dir: Some(EmptyDirVolumeSource {
            medium: Some(medium.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Volume backed by a claim
pub fn claim(volume: &str, claim_name: &str) -> Volume {
    Volume {
        name: volume.to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: claim_name.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `key` projected as file `path`
pub fn item(key: &str, path: &str) -> KeyToPath {
    KeyToPath {
        key: key.to_string(),
        path: path.to_string(),
        ..Default::default()
    }
}

/// Mount of a whole volume
pub fn mount(volume: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: volume.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

/// Mount of one file out of a volume
pub fn sub_path_mount(volume: &str, path: &str, sub_path: &str) -> VolumeMount {
    VolumeMount {
        sub_path: Some(sub_path.to_string()),
        ..mount(volume, path)
    }
}
