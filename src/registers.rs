use bitfield::bitfield;

// Register 0x00. Read-only.
bitfield! {
    pub struct StatusReg(u8);
    impl Debug;
    /// Load impedance fell below the threshold; the output is shut down
    /// until it recovers. Latching.
    pub oc_detected, _: 0;
    /// Thermal shutdown. Clears on read.
    pub over_temp, _: 1;
    /// ERM back-EMF stayed at zero, or the LRA lost frequency lock. Clears
    /// on read.
    pub feedback_controller_timed_out, _: 2;
    /// Outcome of the last auto-calibration or diagnostic run, valid once
    /// GO has cleared. Set means it did not converge or the actuator is
    /// missing, shorted or out of range.
    pub diagnostic_result, _: 3;
    /// 3: DRV2605, 4: DRV2604, 6: DRV2604L, 7: DRV2605L
    pub device_id, _: 7, 5;
}

/// Playback engine mode, MODE[2:0] of register 0x01.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// GO fires the waveform sequence
    InternalTrigger = 0,
    /// Rising edge on IN/TRIG sets GO; a second one cancels
    ExternalTriggerRisingEdge = 1,
    /// GO follows the level of IN/TRIG
    ExternalTriggerLevel = 2,
    /// IN/TRIG carries a PWM or analog drive signal
    PwmInputAndAnalogInput = 3,
    /// IN/TRIG carries AC-coupled audio
    AudioToVibe = 4,
    /// The output follows the real-time playback register
    RealTimePlayback = 5,
    /// GO runs the actuator diagnostic
    Diagnostics = 6,
    /// GO runs auto-calibration
    AutoCalibration = 7,
}

impl From<u8> for Mode {
    fn from(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::InternalTrigger,
            1 => Self::ExternalTriggerRisingEdge,
            2 => Self::ExternalTriggerLevel,
            3 => Self::PwmInputAndAnalogInput,
            4 => Self::AudioToVibe,
            5 => Self::RealTimePlayback,
            6 => Self::Diagnostics,
            _ => Self::AutoCalibration,
        }
    }
}

impl From<Mode> for u8 {
    fn from(mode: Mode) -> u8 {
        mode as u8
    }
}

bitfield! {
    pub struct ModeReg(u8);
    impl Debug;
    /// Self-clearing software reset; every register returns to its default
    pub dev_reset, set_dev_reset: 7;
    /// Software standby
    pub standby, set_standby: 6;
    pub into Mode, mode, set_mode: 2, 0;
}

/// Built-in waveform library. The effects are the same in each; the
/// libraries differ in the actuator they are tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Library {
    Empty = 0,
    /// ERM, 1.3 V rated, 3 V overdrive
    A = 1,
    /// ERM, 3 V rated, fast brake
    B = 2,
    /// ERM, 3 V rated
    C = 3,
    /// ERM, 3 V rated, slow rise
    D = 4,
    /// ERM, 3 V rated, slowest rise and brake
    E = 5,
    /// Tuned for linear resonance actuators
    Lra = 6,
    /// ERM, 4.5 V rated, 5 V overdrive
    F = 7,
}

impl From<u8> for Library {
    fn from(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::Empty,
            1 => Self::A,
            2 => Self::B,
            3 => Self::C,
            4 => Self::D,
            5 => Self::E,
            6 => Self::Lra,
            _ => Self::F,
        }
    }
}

impl From<Library> for u8 {
    fn from(library: Library) -> u8 {
        library as u8
    }
}

bitfield! {
    pub struct LibrarySelectionReg(u8);
    impl Debug;
    /// Output driver in true high impedance
    pub hi_z, set_hi_z: 4;
    pub into Library, library_selection, set_library_selection: 2, 0;
}

/// Index of one of the eight waveform sequencer slots. Playback runs from
/// slot 0 upwards and stops at the first slot holding [`Effect::Stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WaveformSlot(u8);

impl WaveformSlot {
    pub const COUNT: u8 = 8;

    /// Returns `None` for indices outside `0..=7`
    pub fn new(index: u8) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub(crate) fn register(self) -> Register {
        match self.0 {
            0 => Register::WaveformSequence0,
            1 => Register::WaveformSequence1,
            2 => Register::WaveformSequence2,
            3 => Register::WaveformSequence3,
            4 => Register::WaveformSequence4,
            5 => Register::WaveformSequence5,
            6 => Register::WaveformSequence6,
            _ => Register::WaveformSequence7,
        }
    }
}

/// Declares [`Effect`] and both byte conversions from one table, so the
/// catalog ids only appear once.
macro_rules! effect_catalog {
    ($($(#[$attr:meta])* $name:ident = $id:literal,)+) => {
        /// Identifier of a built-in ROM waveform, as stored in a waveform
        /// sequence slot. Every byte value maps to exactly one `Effect` and back.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum Effect {
            /// No effect; playback stops at the first slot holding this value
            Stop,
            /// Wait for (up to 127) counts of 10ms instead of playing an effect
            Delays(u8),
            $($(#[$attr])* $name,)+
            /// An identifier the ROM catalog does not name (124..=127)
            Unlisted(u8),
        }

        impl From<Effect> for u8 {
            fn from(effect: Effect) -> u8 {
                match effect {
                    Effect::Stop => 0,
                    Effect::Delays(n) => n | 0x80,
                    $(Effect::$name => $id,)+
                    Effect::Unlisted(id) => id,
                }
            }
        }

        impl From<u8> for Effect {
            fn from(id: u8) -> Effect {
                match id {
                    0 => Effect::Stop,
                    $($id => Effect::$name,)+
                    n if n & 0x80 != 0 => Effect::Delays(n & 0x7f),
                    n => Effect::Unlisted(n),
                }
            }
        }
    };
}

// Names follow the waveform library table of the datasheet, with the
// strength percentage as suffix.
effect_catalog! {
    StrongClick100 = 1,
    StrongClick60 = 2,
    StrongClick30 = 3,
    SharpClick100 = 4,
    SharpClick60 = 5,
    SharpClick30 = 6,
    SoftBump100 = 7,
    SoftBump60 = 8,
    SoftBump30 = 9,
    DoubleClick100 = 10,
    DoubleClick60 = 11,
    TripleClick100 = 12,
    SoftFuzz60 = 13,
    StrongBuzz100 = 14,
    Alert750ms = 15,
    Alert1000ms = 16,
    StrongClickOne100 = 17,
    StrongClickTwo80 = 18,
    StrongClickThree60 = 19,
    StrongClickFour30 = 20,
    MediumClickOne100 = 21,
    MediumClickTwo80 = 22,
    MediumClickThree60 = 23,
    SharpTickOne100 = 24,
    SharpTickTwo80 = 25,
    SharpTickThree60 = 26,
    ShortDoubleClickStrongOne100 = 27,
    ShortDoubleClickStrongTwo80 = 28,
    ShortDoubleClickStrongThree60 = 29,
    ShortDoubleClickStrongFour30 = 30,
    ShortDoubleClickMediumOne100 = 31,
    ShortDoubleClickMediumTwo80 = 32,
    ShortDoubleClickMediumThree60 = 33,
    ShortDoubleSharpTickOne100 = 34,
    ShortDoubleSharpTickTwo80 = 35,
    ShortDoubleSharpTickThree60 = 36,
    LongDoubleSharpClickStrongOne100 = 37,
    LongDoubleSharpClickStrongTwo80 = 38,
    LongDoubleSharpClickStrongThree60 = 39,
    LongDoubleSharpClickStrongFour30 = 40,
    LongDoubleSharpClickMediumOne100 = 41,
    LongDoubleSharpClickMediumTwo80 = 42,
    LongDoubleSharpClickMediumThree60 = 43,
    LongDoubleSharpTickOne100 = 44,
    LongDoubleSharpTickTwo80 = 45,
    LongDoubleSharpTickThree60 = 46,
    BuzzOne100 = 47,
    BuzzTwo80 = 48,
    BuzzThree60 = 49,
    BuzzFour40 = 50,
    BuzzFive20 = 51,
    PulsingStrongOne100 = 52,
    PulsingStrongTwo60 = 53,
    PulsingMediumOne100 = 54,
    PulsingMediumTwo60 = 55,
    PulsingSharpOne100 = 56,
    PulsingSharpTwo60 = 57,
    TransitionClickOne100 = 58,
    TransitionClickTwo80 = 59,
    TransitionClickThree60 = 60,
    TransitionClickFour40 = 61,
    TransitionClickFive20 = 62,
    TransitionClickSix10 = 63,
    TransitionHumOne100 = 64,
    TransitionHumTwo80 = 65,
    TransitionHumThree60 = 66,
    TransitionHumFour40 = 67,
    TransitionHumFive20 = 68,
    TransitionHumSix10 = 69,
    TransitionRampDownLongSmoothOne100to0 = 70,
    TransitionRampDownLongSmoothTwo100to0 = 71,
    TransitionRampDownMediumSmoothOne100to0 = 72,
    TransitionRampDownMediumSmoothTwo100to0 = 73,
    TransitionRampDownShortSmoothOne100to0 = 74,
    TransitionRampDownShortSmoothTwo100to0 = 75,
    TransitionRampDownLongSharpOne100to0 = 76,
    TransitionRampDownLongSharpTwo100to0 = 77,
    TransitionRampDownMediumSharpOne100to0 = 78,
    TransitionRampDownMediumSharpTwo100to0 = 79,
    TransitionRampDownShortSharpOne100to0 = 80,
    TransitionRampDownShortSharpTwo100to0 = 81,
    TransitionRampUpLongSmoothOne0to100 = 82,
    TransitionRampUpLongSmoothTwo0to100 = 83,
    TransitionRampUpMediumSmoothOne0to100 = 84,
    TransitionRampUpMediumSmoothTwo0to100 = 85,
    TransitionRampUpShortSmoothOne0to100 = 86,
    TransitionRampUpShortSmoothTwo0to100 = 87,
    TransitionRampUpLongSharpOne0to100 = 88,
    TransitionRampUpLongSharpTwo0to100 = 89,
    TransitionRampUpMediumSharpOne0to100 = 90,
    TransitionRampUpMediumSharpTwo0to100 = 91,
    TransitionRampUpShortSharpOne0to100 = 92,
    TransitionRampUpShortSharpTwo0to100 = 93,
    TransitionRampDownLongSmoothOne50to0 = 94,
    TransitionRampDownLongSmoothTwo50to0 = 95,
    TransitionRampDownMediumSmoothOne50to0 = 96,
    TransitionRampDownMediumSmoothTwo50to0 = 97,
    TransitionRampDownShortSmoothOne50to0 = 98,
    TransitionRampDownShortSmoothTwo50to0 = 99,
    TransitionRampDownLongSharpOne50to0 = 100,
    TransitionRampDownLongSharpTwo50to0 = 101,
    TransitionRampDownMediumSharpOne50to0 = 102,
    TransitionRampDownMediumSharpTwo50to0 = 103,
    TransitionRampDownShortSharpOne50to0 = 104,
    TransitionRampDownShortSharpTwo50to0 = 105,
    TransitionRampUpLongSmoothOne0to50 = 106,
    TransitionRampUpLongSmoothTwo0to50 = 107,
    TransitionRampUpMediumSmoothOne0to50 = 108,
    TransitionRampUpMediumSmoothTwo0to50 = 109,
    TransitionRampUpShortSmoothOne0to50 = 110,
    TransitionRampUpShortSmoothTwo0to50 = 111,
    TransitionRampUpLongSharpOne0to50 = 112,
    TransitionRampUpLongSharpTwo0to50 = 113,
    TransitionRampUpMediumSharpOne0to50 = 114,
    TransitionRampUpMediumSharpTwo0to50 = 115,
    TransitionRampUpShortSharpOne0to50 = 116,
    TransitionRampUpShortSharpTwo0to50 = 117,
    LongBuzzForProgrammaticStopping100 = 118,
    SmoothHumOne50 = 119,
    SmoothHumTwo40 = 120,
    SmoothHumThree30 = 121,
    SmoothHumFour20 = 122,
    SmoothHumFive10 = 123,
}

bitfield! {
    pub struct GoReg(u8);
    impl Debug;
    /// Starts whatever process MODE selects and stays set until it is done.
    /// Writing 0 cancels it.
    pub go, set_go: 0;
}

/// Actuator technology, selected by the N_ERM_LRA bit of the feedback
/// control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorType {
    /// Eccentric rotating mass
    Erm,
    /// Linear resonance actuator
    Lra,
}

// Register 0x1A
bitfield! {
    pub struct FeedbackControlReg(u8);
    impl Debug;
    /// Set for LRA, clear for ERM. Must be right before auto-calibration.
    pub n_erm_lra, set_n_erm_lra: 7;
    /// Brake to drive gain ratio: 1x, 2x, 3x, 4x, 6x, 8x, 16x, off
    pub fb_brake_factor, set_fb_brake_factor: 6, 4;
    /// Low, medium, high, very high
    pub loop_gain, set_loop_gain: 3, 2;
    /// Back-EMF amplifier gain; auto-calibration overwrites it
    pub bemf_gain, set_bemf_gain: 1, 0;
}

impl Default for FeedbackControlReg {
    /// ERM, 4x brake factor, medium loop gain, back-EMF gain 2
    fn default() -> Self {
        Self::for_motor(MotorType::Erm)
    }
}

impl FeedbackControlReg {
    /// Closed-loop preset for `motor`
    pub fn for_motor(motor: MotorType) -> Self {
        let mut reg = Self(0);
        reg.set_n_erm_lra(motor == MotorType::Lra);
        reg.set_fb_brake_factor(3);
        reg.set_loop_gain(1);
        reg.set_bemf_gain(2);
        reg
    }
}

// Register 0x1C
bitfield! {
    pub struct Control2Reg(u8);
    impl Debug;
    pub bidir_input, set_bidir_input: 7;
    /// Lower loop gain near the end of braking
    pub brake_stabilizer, set_brake_stabilizer: 6;
    /// LRA auto-resonance sampling time, 150 µs + 50 µs per step
    pub sample_time, set_sample_time: 5, 4;
    pub blanking_time, set_blanking_time: 3, 2;
    pub idiss_time, set_idiss_time: 1, 0;
}

impl Default for Control2Reg {
    fn default() -> Self {
        let mut reg = Self(0);
        reg.set_bidir_input(true);
        reg.set_brake_stabilizer(true);
        reg.set_sample_time(3);
        reg.set_blanking_time(1);
        reg.set_idiss_time(1);
        reg
    }
}

// Register 0x1E
bitfield! {
    pub struct Control4Reg(u8);
    impl Debug;
    /// Zero-crossing detect time, 100 µs to 390 µs
    pub zc_det_time, set_zc_det_time: 7, 6;
    /// Auto-calibration duration: 150, 250, 500 or 1000 ms minimum
    pub auto_cal_time, set_auto_cal_time: 5, 4;
    pub otp_status, _: 2;
}

impl Default for Control4Reg {
    fn default() -> Self {
        let mut reg = Self(0);
        reg.set_auto_cal_time(2);
        reg
    }
}

// Register 0x1F
bitfield! {
    pub struct Control5Reg(u8);
    impl Debug;
    /// Sync attempts before falling back to open loop, 3 + n
    pub auto_ol_cnt, set_auto_ol_cnt: 7, 6;
    pub lra_auto_open_loop, set_lra_auto_open_loop: 5;
    /// Set for a 1 ms playback interval instead of 5 ms
    pub playback_interval, set_playback_interval: 4;
}

impl Default for Control5Reg {
    fn default() -> Self {
        let mut reg = Self(0);
        reg.set_auto_ol_cnt(2);
        reg
    }
}

/// Register addresses
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    Status = 0x00,
    Mode = 0x01,
    /// RTP_INPUT, driven to the output in real-time playback mode
    RealTimePlaybackInput = 0x02,
    LibrarySelection = 0x03,
    WaveformSequence0 = 0x04,
    WaveformSequence1 = 0x05,
    WaveformSequence2 = 0x06,
    WaveformSequence3 = 0x07,
    WaveformSequence4 = 0x08,
    WaveformSequence5 = 0x09,
    WaveformSequence6 = 0x0a,
    WaveformSequence7 = 0x0b,
    Go = 0x0c,
    OverdriveTimeOffset = 0x0d,
    SustainTimeOffsetPositive = 0x0e,
    SustainTimeOffsetNegative = 0x0f,
    BrakeTimeOffset = 0x10,
    AudioToVibeControl = 0x11,
    AudioToVibeMinimumInputLevel = 0x12,
    AudioToVibeMaximumInputLevel = 0x13,
    /// Full-scale reference in closed loop; auto-calibration input
    RatedVoltage = 0x16,
    /// Overdrive clamp in closed loop, full scale in open loop
    OverdriveClampVoltage = 0x17,
    /// Coefficient = 1 + code / 255
    AutoCalibrationCompensationResult = 0x18,
    /// Back-EMF (V) = code / 255 × 1.22 / BEMF_GAIN
    AutoCalibrationBackEMFResult = 0x19,
    FeedbackControl = 0x1a,
    Control1 = 0x1b,
    Control2 = 0x1c,
    Control3 = 0x1d,
    Control4 = 0x1e,
    Control5 = 0x1f,
    VBatVoltageMonitor = 0x21,
    LraResonancePeriod = 0x22,
}
