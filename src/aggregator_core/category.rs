//! Vessel category from the AIS ship type code

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VesselCategory {
    Passenger,
    Cargo,
    Tanker,
    Other,
}

impl VesselCategory {
    /// Interpret `ship_type` as an integer code: 60-69 passenger, 70-79 cargo,
    /// 80-89 tanker. Non-numeric or out-of-range codes are `Other`.
    pub fn from_ship_type(ship_type: &str) -> Self {
        match ship_type.trim().parse::<i64>() {
            Ok(60..=69) => VesselCategory::Passenger,
            Ok(70..=79) => VesselCategory::Cargo,
            Ok(80..=89) => VesselCategory::Tanker,
            _ => VesselCategory::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds() {
        assert_eq!(VesselCategory::from_ship_type("59"), VesselCategory::Other);
        assert_eq!(VesselCategory::from_ship_type("60"), VesselCategory::Passenger);
        assert_eq!(VesselCategory::from_ship_type("69"), VesselCategory::Passenger);
        assert_eq!(VesselCategory::from_ship_type("70"), VesselCategory::Cargo);
        assert_eq!(VesselCategory::from_ship_type("79"), VesselCategory::Cargo);
        assert_eq!(VesselCategory::from_ship_type("80"), VesselCategory::Tanker);
        assert_eq!(VesselCategory::from_ship_type("89"), VesselCategory::Tanker);
        assert_eq!(VesselCategory::from_ship_type("90"), VesselCategory::Other);
    }

    #[test]
    fn test_unparseable_codes_are_other() {
        assert_eq!(VesselCategory::from_ship_type(""), VesselCategory::Other);
        assert_eq!(VesselCategory::from_ship_type("cargo"), VesselCategory::Other);
        assert_eq!(VesselCategory::from_ship_type("70.5"), VesselCategory::Other);
        assert_eq!(VesselCategory::from_ship_type("-70"), VesselCategory::Other);
        assert_eq!(VesselCategory::from_ship_type(" 72 "), VesselCategory::Cargo);
    }
}
