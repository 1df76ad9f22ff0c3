//! Static USB device/configuration/string descriptor blob.
//!
//! Byte-for-byte stable; structure dictated by USB, not a redesign target.
//! The DFU interface is numbered 1 to match the control-request handler's
//! `wIndex == 1` filter (see [`crate::consts::DFU_INTERFACE`]).

use crate::consts::FIXED_CONTROL_ENDPOINT_SIZE;

/// bLength=18, bDescriptorType=1 (Device).
pub static DEVICE_DESCRIPTOR: [u8; 18] = [
    18,   // bLength
    1,    // bDescriptorType (Device)
    0x10, 0x01, // bcdUSB (1.10)
    0,    // bDeviceClass (defined at interface level)
    0,    // bDeviceSubClass
    0,    // bDeviceProtocol
    FIXED_CONTROL_ENDPOINT_SIZE as u8, // bMaxPacketSize0
    0xA1, 0x01, // idVendor (0x01A1)
    0xC8, 0x07, // idProduct (0x07C8)
    0x01, 0x00, // bcdDevice (0.01)
    1,    // iManufacturer
    2,    // iProduct
    0,    // iSerialNumber
    1,    // bNumConfigurations
];

/// Configuration header (9) + interface (9) + 2 bulk endpoints (7 each) = 32.
pub static CONFIG_DESCRIPTOR: [u8; 32] = [
    // Configuration descriptor
    9,    // bLength
    2,    // bDescriptorType (Configuration)
    32, 0, // wTotalLength
    1,    // bNumInterfaces
    1,    // bConfigurationValue
    0,    // iConfiguration
    0x80, // bmAttributes (reserved bit set, bus powered)
    50,   // bMaxPower (100 mA)
    // Interface descriptor (vendor class)
    9,    // bLength
    4,    // bDescriptorType (Interface)
    1,    // bInterfaceNumber (matches DFU_INTERFACE)
    0,    // bAlternateSetting
    2,    // bNumEndpoints
    0xFF, // bInterfaceClass (vendor-specific)
    0,    // bInterfaceSubClass
    0,    // bInterfaceProtocol
    0,    // iInterface
    // Endpoint descriptor (EP1 IN, bulk)
    7,    // bLength
    5,    // bDescriptorType (Endpoint)
    0x81, // bEndpointAddress (EP1 IN)
    0x02, // bmAttributes (Bulk)
    64, 0, // wMaxPacketSize
    0,    // bInterval (ignored for bulk)
    // Endpoint descriptor (EP2 OUT, bulk)
    7,    // bLength
    5,    // bDescriptorType (Endpoint)
    0x02, // bEndpointAddress (EP2 OUT)
    0x02, // bmAttributes (Bulk)
    64, 0, // wMaxPacketSize
    0,    // bInterval (ignored for bulk)
];

/// String descriptor 0: language list (English, US).
pub static STRING_DESC_0: [u8; 4] = [4, 3, 0x09, 0x04];

/// String descriptor 1 (vendor): "Oxygen".
pub static STRING_DESC_1: [u8; 14] = [
    14, 3,
    b'O', 0, b'x', 0, b'y', 0, b'g', 0, b'e', 0, b'n', 0,
];

/// String descriptor 2 (product): "Oxygen DFU Bootloader".
pub static STRING_DESC_2: [u8; 44] = [
    44, 3,
    b'O', 0, b'x', 0, b'y', 0, b'g', 0, b'e', 0, b'n', 0, b' ', 0,
    b'D', 0, b'F', 0, b'U', 0, b' ', 0,
    b'B', 0, b'o', 0, b'o', 0, b't', 0, b'l', 0, b'o', 0, b'a', 0, b'd', 0, b'e', 0, b'r', 0,
];

const DTYPE_DEVICE: u8 = 1;
const DTYPE_CONFIGURATION: u8 = 2;
const DTYPE_STRING: u8 = 3;

/// Looks up a descriptor by `(bDescriptorType, index)`, as served by
/// USB's GET_DESCRIPTOR. Returns `None` ("no descriptor") for anything else.
pub fn get_descriptor(desc_type: u8, index: u8) -> Option<&'static [u8]> {
    match desc_type {
        DTYPE_DEVICE => Some(&DEVICE_DESCRIPTOR),
        DTYPE_CONFIGURATION => Some(&CONFIG_DESCRIPTOR),
        DTYPE_STRING => match index {
            0 => Some(&STRING_DESC_0),
            1 => Some(&STRING_DESC_1),
            2 => Some(&STRING_DESC_2),
            _ => None,
        },
        _ => None,
    }
}
