use aviex_drivers::device::Detector;
use aviex_drivers::devices::pccd_170170;
use aviex_drivers::devices::pccd_4824;

fn simulated_170170() -> pccd_170170::Device {
    pccd_170170::Device::simulated(pccd_170170::PROPERTIES.default_configuration.clone()).unwrap()
}

#[test]
fn defaults_are_seeded_at_open() {
    let mut device = simulated_170170();
    assert_eq!(
        device
            .read_register(pccd_170170::DH_FRAMES_PER_SEQUENCE)
            .unwrap(),
        1
    );
    assert_eq!(
        device.read_register(pccd_170170::DH_GAP_TIME).unwrap(),
        1
    );
    assert_eq!(
        device.read_register(pccd_170170::DH_FPGA_VERSION).unwrap(),
        0x0117
    );
    assert_eq!(
        device
            .read_register(pccd_170170::DH_PHYSICAL_PIXELS_PER_LINE)
            .unwrap(),
        4096
    );
}

#[test]
fn read_only_registers_reject_writes() {
    let mut device = simulated_170170();
    assert!(matches!(
        device.write_register(pccd_170170::DH_FPGA_VERSION, 1),
        Err(pccd_170170::Error::Device(
            aviex_drivers::device::Error::Register(
                aviex_drivers::registers::Error::PermissionDenied { .. }
            )
        ))
    ));
}

#[test]
fn out_of_range_values_are_rejected() {
    let mut device = simulated_170170();
    assert!(matches!(
        device.write_register(pccd_170170::DH_FRAMES_PER_SEQUENCE, 0),
        Err(pccd_170170::Error::Device(
            aviex_drivers::device::Error::Register(aviex_drivers::registers::Error::OutOfRange {
                ..
            })
        ))
    ));
    assert!(matches!(
        device.write_register(pccd_170170::DH_EXPOSURE_TIME, 65536),
        Err(pccd_170170::Error::Device(
            aviex_drivers::device::Error::Register(aviex_drivers::registers::Error::OutOfRange {
                ..
            })
        ))
    ));
    // rejected writes must not dirty the mirror or the head
    assert_eq!(
        device
            .read_register(pccd_170170::DH_FRAMES_PER_SEQUENCE)
            .unwrap(),
        1
    );
}

#[test]
fn binning_must_be_a_power_of_two() {
    let mut device = simulated_170170();
    assert!(matches!(
        device.write_register(pccd_170170::DH_PIXEL_BINNING, 3),
        Err(pccd_170170::Error::Device(
            aviex_drivers::device::Error::Register(
                aviex_drivers::registers::Error::NotPowerOfTwo { .. }
            )
        ))
    ));
    device
        .write_register(pccd_170170::DH_PIXEL_BINNING, 4)
        .unwrap();
    assert_eq!(
        device.read_register(pccd_170170::DH_PIXEL_BINNING).unwrap(),
        4
    );
}

#[test]
fn unknown_addresses_are_rejected() {
    let mut device = simulated_170170();
    assert!(matches!(
        device.read_register(0x0100),
        Err(pccd_170170::Error::Device(
            aviex_drivers::device::Error::Register(
                aviex_drivers::registers::Error::UnknownAddress { .. }
            )
        ))
    ));
}

#[test]
fn pseudo_registers_preserve_neighbour_bits() {
    let mut device = simulated_170170();
    device
        .set_pseudo_register(aviex_drivers::control::PseudoRegister::TriggerMode, 1)
        .unwrap();
    device
        .set_pseudo_register(aviex_drivers::control::PseudoRegister::ReadoutSpeed, 1)
        .unwrap();
    assert_eq!(
        device
            .get_pseudo_register(aviex_drivers::control::PseudoRegister::TriggerMode)
            .unwrap(),
        1
    );
    assert_eq!(
        device
            .get_pseudo_register(aviex_drivers::control::PseudoRegister::ReadoutSpeed)
            .unwrap(),
        1
    );
    // trigger mode sits at bit 3, readout speed at bit 6
    assert_eq!(
        device.read_register(pccd_170170::DH_CONTROL).unwrap(),
        (1 << 3) | (1 << 6)
    );
}

#[test]
fn pseudo_registers_are_addressable() {
    let mut device = simulated_170170();
    let address = pccd_170170::DH_PSEUDO_BASE
        + aviex_drivers::control::PseudoRegister::TriggerMode.index();
    device.write_register(address, 1).unwrap();
    assert_eq!(device.read_register(address).unwrap(), 1);
    assert_eq!(
        device
            .get_pseudo_register(aviex_drivers::control::PseudoRegister::TriggerMode)
            .unwrap(),
        1
    );
    assert!(matches!(
        device.read_register(pccd_170170::DH_PSEUDO_BASE + 12),
        Err(pccd_170170::Error::Device(
            aviex_drivers::device::Error::Control(
                aviex_drivers::control::Error::UnknownPseudoRegisterAddress { .. }
            )
        ))
    ));
}

#[test]
fn values_wider_than_the_field_are_rejected() {
    let mut device = simulated_170170();
    assert!(matches!(
        device.set_pseudo_register(aviex_drivers::control::PseudoRegister::TriggerMode, 4),
        Err(pccd_170170::Error::Device(
            aviex_drivers::device::Error::Control(aviex_drivers::control::Error::ValueTooWide {
                ..
            })
        ))
    ));
}

#[test]
fn unsupported_pseudo_registers_are_rejected() {
    let mut device =
        pccd_4824::Device::simulated(pccd_4824::PROPERTIES.default_configuration.clone()).unwrap();
    assert!(matches!(
        device.get_pseudo_register(aviex_drivers::control::PseudoRegister::OverExposureWarning),
        Err(pccd_4824::Error::Device(
            aviex_drivers::device::Error::Control(
                aviex_drivers::control::Error::UnsupportedPseudoRegister { .. }
            )
        ))
    ));
}

#[test]
fn open_applies_the_configuration() {
    let mut device = pccd_4824::Device::simulated(pccd_4824::Configuration {
        trigger_mode: aviex_drivers::control::TriggerMode::External,
        readout_speed: aviex_drivers::control::ReadoutSpeed::High,
        offset_correction: true,
        linearization: false,
        shutter_disable: false,
        binning: (2, 4),
    })
    .unwrap();
    assert_eq!(
        device
            .get_pseudo_register(aviex_drivers::control::PseudoRegister::TriggerMode)
            .unwrap(),
        1
    );
    assert_eq!(
        device
            .get_pseudo_register(aviex_drivers::control::PseudoRegister::OffsetCorrection)
            .unwrap(),
        1
    );
    assert_eq!(
        device.read_register(pccd_4824::DH_PIXEL_BINNING).unwrap(),
        2
    );
    assert_eq!(
        device.read_register(pccd_4824::DH_LINE_BINNING).unwrap(),
        4
    );
    assert_eq!(device.geometry().binsize, (2, 4));
}

#[test]
fn type_parses_from_module_names() {
    assert_eq!(
        "pccd_170170".parse::<aviex_drivers::Type>().unwrap(),
        aviex_drivers::Type::Pccd170170
    );
    assert_eq!(
        "pccd_16080".parse::<aviex_drivers::Type>().unwrap(),
        aviex_drivers::Type::Pccd16080
    );
    assert!("pccd_999".parse::<aviex_drivers::Type>().is_err());
}

#[test]
fn configuration_roundtrips_through_bincode() {
    let configuration = pccd_4824::Configuration {
        trigger_mode: aviex_drivers::control::TriggerMode::External,
        readout_speed: aviex_drivers::control::ReadoutSpeed::Normal,
        offset_correction: true,
        linearization: true,
        shutter_disable: false,
        binning: (8, 8),
    };
    let data = aviex_drivers::bincode::serialize(&configuration).unwrap();
    match aviex_drivers::Configuration::deserialize_bincode(aviex_drivers::Type::Pccd4824, &data)
        .unwrap()
    {
        aviex_drivers::Configuration::Pccd4824(deserialized) => {
            assert_eq!(deserialized, configuration)
        }
        configuration => panic!("unexpected configuration {:?}", configuration),
    }
}

#[test]
fn simulated_enum_dispatch() {
    let mut device = aviex_drivers::simulated(aviex_drivers::Configuration::Pccd170170(
        pccd_170170::PROPERTIES.default_configuration.clone(),
    ))
    .unwrap();
    assert_eq!(device.name(), "PCCD-170170");
    assert_eq!(device.geometry().framesize, (4096, 4096));
    assert_eq!(
        device
            .read_register(pccd_170170::DH_FRAMES_PER_SEQUENCE)
            .unwrap(),
        1
    );
}
