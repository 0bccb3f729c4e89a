use std::collections::HashMap;

/// Decoded query parameters of one request. First occurrence wins.
pub type Params = HashMap<String, String>;

pub const DEFAULT_STATUS: u16 = 200;

/// A delay of `base_ms`, plus up to `jitter_span_ms` of extra delay when the
/// jitter draw fires.
///
/// Grammar: `<baseMs>`, `<baseMs>,<spanMs>` or `<baseMs>,<spanMs>,<percent>`.
/// A single value is an exact delay. Two values always apply jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DelaySpec {
    pub base_ms: u64,
    pub jitter_span_ms: u64,
    pub probability: u8,
}

impl DelaySpec {
    pub fn fixed(base_ms: u64) -> Self {
        Self {
            base_ms,
            jitter_span_ms: 0,
            probability: 0,
        }
    }

    pub fn parse(raw: &str) -> Self {
        let mut fields = raw.split(',').map(str::trim);
        let base_ms = fields.next().map(parse_millis).unwrap_or(0);

        match (fields.next(), fields.next()) {
            (None, _) => Self::fixed(base_ms),
            (Some(span), None) => Self {
                base_ms,
                jitter_span_ms: parse_millis(span),
                probability: 100,
            },
            (Some(span), Some(percent)) => Self {
                base_ms,
                jitter_span_ms: parse_millis(span),
                probability: parse_percent(percent),
            },
        }
    }

    pub fn has_jitter(&self) -> bool {
        self.jitter_span_ms > 0
    }

    /// True when no draw can make this delay non-zero.
    pub fn is_zero(&self) -> bool {
        self.base_ms == 0 && !self.has_jitter()
    }
}

/// Per-request fault description, before any random draw has been made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultProfile {
    /// Status returned when the status fault is absent or does not fire.
    pub target_status: u16,
    pub status_fault: Option<u16>,
    pub status_fault_probability: u8,
    pub connect_delay: DelaySpec,
    pub inter_byte_delay: DelaySpec,
    pub reset_requested: bool,
    pub reset_probability: u8,
    /// Whether the request carried any recognised fault parameter.
    pub supplied: bool,
}

impl Default for FaultProfile {
    fn default() -> Self {
        Self {
            target_status: DEFAULT_STATUS,
            status_fault: None,
            status_fault_probability: 0,
            connect_delay: DelaySpec::default(),
            inter_byte_delay: DelaySpec::default(),
            reset_requested: false,
            reset_probability: 0,
            supplied: false,
        }
    }
}

impl FaultProfile {
    /// Parse the unified fault grammar with a fallback status of 200.
    pub fn from_params(params: &Params) -> Self {
        Self::with_fallback_status(params, DEFAULT_STATUS)
    }

    /// Parse the unified fault grammar. `fallback_status` is what the
    /// response carries when no status fault fires.
    ///
    /// Never fails: anything unparsable degrades to its zero value.
    pub fn with_fallback_status(params: &Params, fallback_status: u16) -> Self {
        let mut profile = Self {
            target_status: fallback_status,
            ..Self::default()
        };

        if let Some(raw) = lookup(params, "status") {
            profile.supplied = true;
            let mut fields = raw.split(',').map(str::trim);
            let code = fields.next().and_then(parse_status);
            let probability = fields.next().map(parse_percent).unwrap_or(100);
            if let Some(code) = code {
                profile.status_fault = Some(code);
                profile.status_fault_probability = probability;
            }
        }

        let connect = lookup(params, "slow")
            .or_else(|| lookup(params, "sleepBeforeFirstByte"))
            .or_else(|| lookup(params, "sleep"));
        if let Some(raw) = connect {
            profile.supplied = true;
            profile.connect_delay = DelaySpec::parse(raw);
        }

        if let Some(raw) = lookup(params, "sleepBetweenBytes") {
            profile.supplied = true;
            profile.inter_byte_delay = DelaySpec::parse(raw);
        }

        if let Some(raw) = lookup(params, "reset") {
            profile.supplied = true;
            profile.reset_requested = true;
            profile.reset_probability = raw.split(',').nth(1).map(parse_percent).unwrap_or(100);
        }

        profile
    }

    /// Profile that severs the connection straight away.
    pub fn immediate_reset() -> Self {
        Self {
            reset_requested: true,
            reset_probability: 100,
            supplied: true,
            ..Self::default()
        }
    }
}

fn lookup<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_millis(raw: &str) -> u64 {
    raw.trim().parse().unwrap_or(0)
}

fn parse_percent(raw: &str) -> u8 {
    raw.trim()
        .parse::<u32>()
        .map(|percent| percent.min(100) as u8)
        .unwrap_or(0)
}

/// Codes outside what an HTTP status line can carry are treated as absent,
/// and so are 1xx codes, which cannot end a response.
fn parse_status(raw: &str) -> Option<u16> {
    raw.trim()
        .parse::<u16>()
        .ok()
        .and_then(|code| http::StatusCode::from_u16(code).ok())
        .filter(|status| !status.is_informational())
        .map(|status| status.as_u16())
}
