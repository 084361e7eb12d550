//! # JMA Endpoints
//!
//! URLs of the JMA "bosai" open-data feeds. The payloads are opaque to
//! this crate; only the locations and their caching behavior live here.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;

pub const BASE_URL: &str = "https://www.jma.go.jp/bosai";

/// Area hierarchy (centers, offices, class10s, class15s, class20s)
pub const AREA_URL: &str = "https://www.jma.go.jp/bosai/common/const/area.json";

/// AMeDAS observation station table
pub const AMEDAS_TABLE_URL: &str = "https://www.jma.go.jp/bosai/amedas/const/amedastable.json";

/// Full-disk satellite image timestamps
pub const HIMAWARI_TIMES_URL: &str =
    "https://www.jma.go.jp/bosai/himawari/data/satimg/targetTimes_fd.json";

/// Timestamp layout used in JMA data paths, e.g. `20220211225000`
pub const TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Prefix of the forecast feeds, which change several times a day
const FORECAST_PREFIX: &str = "https://www.jma.go.jp/bosai/forecast/data/";

pub fn forecast_url(office: &str) -> String {
    format!("{BASE_URL}/forecast/data/forecast/{office}.json")
}

pub fn overview_forecast_url(office: &str) -> String {
    format!("{BASE_URL}/forecast/data/overview_forecast/{office}.json")
}

/// AMeDAS observations for every station at `time`
pub fn amedas_map_url(time: NaiveDateTime) -> String {
    format!(
        "{BASE_URL}/amedas/data/map/{}.json",
        time.format(TIME_FORMAT)
    )
}

/// One tile of a full-disk Himawari image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HimawariTile {
    /// `basetime` as listed in the target times feed
    pub basetime: String,
    /// `validtime` as listed in the target times feed
    pub validtime: String,
    pub band: String,
    pub prod: String,
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl HimawariTile {
    pub fn url(&self) -> String {
        format!(
            "{BASE_URL}/himawari/data/satimg/{}/fd/{}/{}/{}/{}/{}/{}.jpg",
            self.basetime, self.validtime, self.band, self.prod, self.z, self.x, self.y
        )
    }
}

/// Whether a URL points at data that is republished under the same
/// location, so a cached copy goes stale.
pub fn is_volatile(url: &str) -> bool {
    url.starts_with(FORECAST_PREFIX)
}

/// Named feeds, parsed from strings such as `area` or `forecast:130000`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Area,
    AmedasTable,
    HimawariTimes,
    Forecast(String),
    OverviewForecast(String),
    AmedasMap(NaiveDateTime),
}

impl Endpoint {
    pub fn url(&self) -> String {
        match self {
            Endpoint::Area => AREA_URL.to_string(),
            Endpoint::AmedasTable => AMEDAS_TABLE_URL.to_string(),
            Endpoint::HimawariTimes => HIMAWARI_TIMES_URL.to_string(),
            Endpoint::Forecast(office) => forecast_url(office),
            Endpoint::OverviewForecast(office) => overview_forecast_url(office),
            Endpoint::AmedasMap(time) => amedas_map_url(*time),
        }
    }

    pub fn is_volatile(&self) -> bool {
        matches!(self, Endpoint::Forecast(_) | Endpoint::OverviewForecast(_))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Area => write!(f, "area"),
            Endpoint::AmedasTable => write!(f, "amedas-table"),
            Endpoint::HimawariTimes => write!(f, "himawari-times"),
            Endpoint::Forecast(office) => write!(f, "forecast:{office}"),
            Endpoint::OverviewForecast(office) => write!(f, "overview:{office}"),
            Endpoint::AmedasMap(time) => write!(f, "amedas-map:{}", time.format(TIME_FORMAT)),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown endpoint '{0}'")]
pub struct ParseEndpointError(pub String);

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };

        match (name, arg) {
            ("area", None) => Ok(Endpoint::Area),
            ("amedas-table", None) => Ok(Endpoint::AmedasTable),
            ("himawari-times", None) => Ok(Endpoint::HimawariTimes),
            ("forecast", Some(office)) if is_office_code(office) => {
                Ok(Endpoint::Forecast(office.to_string()))
            }
            ("overview", Some(office)) if is_office_code(office) => {
                Ok(Endpoint::OverviewForecast(office.to_string()))
            }
            ("amedas-map", Some(time)) => NaiveDateTime::parse_from_str(time, TIME_FORMAT)
                .map(Endpoint::AmedasMap)
                .map_err(|_| ParseEndpointError(s.to_string())),
            _ => Err(ParseEndpointError(s.to_string())),
        }
    }
}

fn is_office_code(code: &str) -> bool {
    !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 2, 11)
            .unwrap()
            .and_hms_opt(22, 50, 0)
            .unwrap()
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            forecast_url("130000"),
            "https://www.jma.go.jp/bosai/forecast/data/forecast/130000.json"
        );
        assert_eq!(
            overview_forecast_url("130000"),
            "https://www.jma.go.jp/bosai/forecast/data/overview_forecast/130000.json"
        );
        assert_eq!(
            amedas_map_url(time()),
            "https://www.jma.go.jp/bosai/amedas/data/map/20220211225000.json"
        );
    }

    #[test]
    fn test_himawari_tile_url() {
        let tile = HimawariTile {
            basetime: "20220211225000".into(),
            validtime: "20220211225000".into(),
            band: "B13".into(),
            prod: "TBB".into(),
            z: 3,
            x: 6,
            y: 2,
        };
        assert_eq!(
            tile.url(),
            "https://www.jma.go.jp/bosai/himawari/data/satimg/20220211225000/fd/20220211225000/B13/TBB/3/6/2.jpg"
        );
    }

    #[test]
    fn test_volatility() {
        assert!(is_volatile(&forecast_url("130000")));
        assert!(is_volatile(&overview_forecast_url("130000")));
        assert!(!is_volatile(AREA_URL));
        assert!(!is_volatile(&amedas_map_url(time())));
        assert!(Endpoint::Forecast("130000".into()).is_volatile());
        assert!(!Endpoint::HimawariTimes.is_volatile());
    }

    #[test]
    fn test_parse_endpoint() {
        assert_eq!("area".parse(), Ok(Endpoint::Area));
        assert_eq!("amedas-table".parse(), Ok(Endpoint::AmedasTable));
        assert_eq!("himawari-times".parse(), Ok(Endpoint::HimawariTimes));
        assert_eq!(
            "forecast:130000".parse(),
            Ok(Endpoint::Forecast("130000".into()))
        );
        assert_eq!(
            "overview:016000".parse(),
            Ok(Endpoint::OverviewForecast("016000".into()))
        );
        assert_eq!(
            "amedas-map:20220211225000".parse(),
            Ok(Endpoint::AmedasMap(time()))
        );

        assert!("forecast".parse::<Endpoint>().is_err());
        assert!("forecast:../x".parse::<Endpoint>().is_err());
        assert!("amedas-map:yesterday".parse::<Endpoint>().is_err());
        assert!("radar".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for endpoint in [
            Endpoint::Area,
            Endpoint::Forecast("130000".into()),
            Endpoint::AmedasMap(time()),
        ] {
            assert_eq!(endpoint.to_string().parse(), Ok(endpoint));
        }
    }
}
