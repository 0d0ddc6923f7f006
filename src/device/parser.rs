use crate::core::types::{Device, DeviceState};
use lazy_static::lazy_static;
use log::*;
use regex::Regex;

lazy_static! {
    static ref RE_ATTRIBUTE: Regex =
        Regex::new(r"^(product|model|device|features|usb|transport_id):(.*)$").unwrap();
}

const NO_PERMISSIONS: &str = "no permissions";

/// Parse a device-list body (one device per line) as sent by
/// `host:devices[-l]` and `host:track-devices[-l]`.
pub fn parse_device_list(body: &str) -> Vec<Device> {
    body.lines().filter_map(parse_device_line).collect()
}

/// Parse one `serial <ws> state [key:value ...]` record.
///
/// Returns `None` for blank lines and the `List of devices attached` banner.
pub fn parse_device_line(line: &str) -> Option<Device> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("List of devices") {
        return None;
    }

    let (serial, rest) = match line.split_once(char::is_whitespace) {
        Some((serial, rest)) => (serial, rest.trim_start()),
        None => (line, ""),
    };

    let (state, rest) = if let Some(rest) = rest.strip_prefix(NO_PERMISSIONS) {
        (DeviceState::NoPermissions, rest)
    } else {
        match rest.split_once(char::is_whitespace) {
            Some((token, rest)) => (DeviceState::from_token(token), rest),
            None => (DeviceState::from_token(rest), ""),
        }
    };

    let mut device = Device::new(serial, state);
    let mut free_text = Vec::new();

    for token in rest.split_whitespace() {
        let Some(caps) = RE_ATTRIBUTE.captures(token) else {
            free_text.push(token);
            continue;
        };
        let value = &caps[2];
        if value.is_empty() {
            continue;
        }
        match &caps[1] {
            "product" => device.product = Some(value.to_string()),
            "model" => device.model = Some(value.to_string()),
            "device" => device.name = Some(value.to_string()),
            "usb" => device.usb = Some(value.to_string()),
            "transport_id" => device.transport_id = value.parse().ok(),
            "features" => {
                device.features = value
                    .split(',')
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => unreachable!("regex only captures known keys"),
        }
    }

    if !free_text.is_empty() {
        if device.state == DeviceState::Online {
            debug!("Ignoring unrecognized tokens for {}: {:?}", device.serial, free_text);
        } else {
            device.message = Some(free_text.join(" "));
        }
    }

    Some(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_format() {
        let devices = parse_device_list("emulator-5554\tdevice\nR58M\toffline\n");
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].serial, "emulator-5554");
        assert_eq!(devices[0].state, DeviceState::Online);
        assert_eq!(devices[1].state, DeviceState::Offline);
        assert!(devices[0].model.is_none());
    }

    #[test]
    fn test_long_format() {
        let line = "0123456789ABCDEF       device usb:1-4 product:oriole model:Pixel_6 device:oriole transport_id:7";
        let device = parse_device_line(line).unwrap();
        assert_eq!(device.serial, "0123456789ABCDEF");
        assert_eq!(device.state, DeviceState::Online);
        assert_eq!(device.usb.as_deref(), Some("1-4"));
        assert_eq!(device.product.as_deref(), Some("oriole"));
        assert_eq!(device.model.as_deref(), Some("Pixel_6"));
        assert_eq!(device.name.as_deref(), Some("oriole"));
        assert_eq!(device.transport_id, Some(7));
        assert!(device.message.is_none());
    }

    #[test]
    fn test_features() {
        let device =
            parse_device_line("S1 device features:shell_v2,cmd,stat_v2 transport_id:1").unwrap();
        assert!(device.has_feature("shell_v2"));
        assert!(device.has_feature("stat_v2"));
        assert_eq!(device.features.len(), 3);
    }

    #[test]
    fn test_no_permissions_message() {
        let line = "S2\tno permissions (user in plugdev group; are your udev rules wrong?); see [http://developer.android.com/tools/device.html] usb:1-2 transport_id:3";
        let device = parse_device_line(line).unwrap();
        assert_eq!(device.state, DeviceState::NoPermissions);
        assert_eq!(device.usb.as_deref(), Some("1-2"));
        assert_eq!(device.transport_id, Some(3));
        let message = device.message.unwrap();
        assert!(message.starts_with("(user in plugdev group"));
        assert!(message.ends_with("device.html]"));
    }

    #[test]
    fn test_authorizing() {
        let device = parse_device_line("S3 authorizing usb:2-1 transport_id:9").unwrap();
        assert_eq!(device.state, DeviceState::Authorizing);
        assert_eq!(device.usb.as_deref(), Some("2-1"));
        assert_eq!(device.transport_id, Some(9));
        assert!(device.message.is_none());
    }

    #[test]
    fn test_bare_states() {
        for (token, state) in [
            ("offline", DeviceState::Offline),
            ("bootloader", DeviceState::BootLoader),
            ("recovery", DeviceState::Recovery),
            ("unauthorized", DeviceState::Unauthorized),
            ("host", DeviceState::Host),
            ("device", DeviceState::Online),
            ("connecting", DeviceState::Connecting),
        ] {
            let device = parse_device_line(&format!("S\t{}", token)).unwrap();
            assert_eq!(device.state, state, "token {}", token);
        }
    }

    #[test]
    fn test_unknown_state_is_not_an_error() {
        let device = parse_device_line("S4\trescue").unwrap();
        assert_eq!(device.state, DeviceState::Unknown);
        let device = parse_device_line("S5").unwrap();
        assert_eq!(device.state, DeviceState::Unknown);
    }

    #[test]
    fn test_blank_and_banner_lines() {
        assert!(parse_device_line("").is_none());
        assert!(parse_device_line("   ").is_none());
        assert!(parse_device_line("List of devices attached").is_none());
        assert!(parse_device_list("").is_empty());
    }
}
