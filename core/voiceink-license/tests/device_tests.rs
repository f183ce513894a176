use voiceink_license::{
    keys, DeviceIdProvider, DeviceInfo, HardwareDeviceId, MemoryStore, RandomDeviceId,
    SettingsStore, StaticDeviceId,
};

#[test]
fn device_info_collection() {
    let info = DeviceInfo::collect();
    assert!(!info.os_name.is_empty());
    assert!(!info.arch.is_empty());
    assert!(!info.hostname.is_empty());
}

#[test]
fn device_info_serde() {
    let info = DeviceInfo::collect();
    let json = serde_json::to_string(&info).unwrap();
    let parsed: DeviceInfo = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.os_name, info.os_name);
    assert_eq!(parsed.arch, info.arch);
}

#[test]
fn serial_hash_is_stable_and_opaque() {
    let a = HardwareDeviceId::from_serial("C02XK1ABJGH5");
    let b = HardwareDeviceId::from_serial("  C02XK1ABJGH5\n");
    assert_eq!(a, b);
    assert!(!a.contains("C02XK1ABJGH5"));
    // 16 bytes, base64url without padding
    assert_eq!(a.len(), 22);
}

#[test]
fn different_serials_differ() {
    assert_ne!(
        HardwareDeviceId::from_serial("SERIAL-A"),
        HardwareDeviceId::from_serial("SERIAL-B")
    );
}

#[test]
fn hardware_id_is_stable() {
    let mut store = MemoryStore::new();
    let first = HardwareDeviceId.device_id(&mut store).unwrap();
    let second = HardwareDeviceId.device_id(&mut store).unwrap();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn random_id_is_generated_once() {
    let mut store = MemoryStore::new();
    let first = RandomDeviceId.device_id(&mut store).unwrap();
    let second = RandomDeviceId.device_id(&mut store).unwrap();
    assert_eq!(first, second);
    assert_eq!(store.get_string(keys::DEVICE_IDENTIFIER), Some(first.clone()));
    assert!(uuid::Uuid::parse_str(&first).is_ok());
}

#[test]
fn random_id_reuses_stored_value() {
    let mut store = MemoryStore::new();
    store.set_string(keys::DEVICE_IDENTIFIER, "EXISTING").unwrap();
    assert_eq!(RandomDeviceId.device_id(&mut store).unwrap(), "EXISTING");
}

#[test]
fn static_id() {
    let mut store = MemoryStore::new();
    let id = StaticDeviceId("device-1".into()).device_id(&mut store).unwrap();
    assert_eq!(id, "device-1");
    assert!(store.is_empty());
}
