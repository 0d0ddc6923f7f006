use crate::core::types::{Device, DeviceState};

/// Create a test device with minimal information
pub fn test_device(serial: &str) -> Device {
    Device::new(serial, DeviceState::Online)
}

/// Create a test device with long-format attributes
pub fn test_device_full(serial: &str, model: &str) -> Device {
    Device::new(serial, DeviceState::Online)
        .with_product(format!("{}_product", model.to_lowercase()))
        .with_model(model)
        .with_name(format!("{}_device", model.to_lowercase()))
        .with_transport_id(1)
}

/// Host protocol string: 4 hex digit length, then the payload
pub fn framed(payload: &str) -> Vec<u8> {
    let mut frame = format!("{:04x}", payload.len()).into_bytes();
    frame.extend_from_slice(payload.as_bytes());
    frame
}

/// `FAIL` followed by a framed message
pub fn fail(message: &str) -> Vec<u8> {
    let mut bytes = b"FAIL".to_vec();
    bytes.extend(framed(message));
    bytes
}

/// Sync frame: 4 byte id and a little-endian u32
pub fn sync_header(id: &[u8; 4], value: u32) -> Vec<u8> {
    let mut frame = id.to_vec();
    frame.extend_from_slice(&value.to_le_bytes());
    frame
}

/// `DATA` frame carrying `payload`
pub fn sync_data(payload: &[u8]) -> Vec<u8> {
    let mut frame = sync_header(b"DATA", payload.len() as u32);
    frame.extend_from_slice(payload);
    frame
}

/// Deterministic non-text payload of `len` bytes
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
