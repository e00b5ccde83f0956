use chrono::{DateTime, Utc};

use crate::metamodel::attributes::{ConversionError, ValueConverter};
use crate::model::value_objects::{Literal, Value};

/// Converts between an integer epoch-seconds field value and an
/// `xsd:dateTime` statement value.
///
/// Both directions are exact: seconds map onto whole-second timestamps and
/// back without drift.
#[derive(Clone, Copy, Debug, Default)]
pub struct EpochSecondsConverter;

impl ValueConverter for EpochSecondsConverter {
    fn name(&self) -> &str {
        "epoch-seconds"
    }

    fn to_axiom_value(&self, value: &Value) -> Result<Value, ConversionError> {
        let seconds = value
            .as_literal()
            .and_then(Literal::as_integer)
            .ok_or_else(|| {
                ConversionError(format!("expected integer epoch seconds, got `{value}`"))
            })?;
        let timestamp = DateTime::<Utc>::from_timestamp(seconds, 0)
            .ok_or_else(|| ConversionError(format!("epoch seconds out of range: {seconds}")))?;
        Ok(Value::Literal(Literal::date_time(timestamp)))
    }

    fn to_field_value(&self, value: &Value) -> Result<Value, ConversionError> {
        let timestamp = value
            .as_literal()
            .and_then(Literal::as_date_time)
            .ok_or_else(|| ConversionError(format!("expected xsd:dateTime, got `{value}`")))?;
        Ok(Value::Literal(Literal::integer(timestamp.timestamp())))
    }
}

#[cfg(test)]
mod tests {
    use super::EpochSecondsConverter;
    use crate::metamodel::attributes::ValueConverter;
    use crate::model::value_objects::{Literal, Value};

    #[test]
    fn epoch_seconds_round_trip_is_exact() {
        let converter = EpochSecondsConverter;
        let field = Value::Literal(Literal::integer(1_709_294_400));
        let axiom = converter.to_axiom_value(&field).expect("to axiom");
        assert!(axiom
            .as_literal()
            .and_then(Literal::as_date_time)
            .is_some());
        assert_eq!(converter.to_field_value(&axiom).expect("back"), field);
    }

    #[test]
    fn non_integer_input_is_rejected() {
        let converter = EpochSecondsConverter;
        let err = converter
            .to_axiom_value(&Value::Literal(Literal::string("soon")))
            .expect_err("not an integer");
        assert!(err.to_string().contains("epoch seconds"));
    }
}
