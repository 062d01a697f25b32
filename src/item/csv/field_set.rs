use csv::StringRecord;
use serde::de::DeserializeOwned;

use crate::BatchError;

/// Raw values of one input line together with the declared field names.
///
/// The names define the expected column count. A field set may hold fewer
/// values than names (missing trailing values read as empty) or more (the
/// extra values are ignored when mapping).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSet {
    names: Vec<String>,
    values: Vec<String>,
}

impl FieldSet {
    pub fn new(names: Vec<String>, values: Vec<String>) -> Self {
        Self { names, values }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn field_count(&self) -> usize {
        self.values.len()
    }

    /// Value of the named field, `None` if the name is not declared.
    ///
    /// A declared field without value reads as an empty string.
    pub fn read_string(&self, name: &str) -> Option<&str> {
        let position = self.names.iter().position(|candidate| candidate == name)?;
        Some(self.values.get(position).map_or("", String::as_str))
    }

    /// Values aligned on the declared names: padded with empty strings or
    /// truncated to the name count.
    fn aligned_values(&self) -> StringRecord {
        (0..self.names.len())
            .map(|position| self.values.get(position).map_or("", String::as_str))
            .collect()
    }

    /// Maps the field set onto `T` by field name.
    ///
    /// Fields of `T` are matched against the declared names; names without a
    /// matching field are ignored. Values are coerced by serde, so a value that
    /// cannot be converted to the field type is a mapping error.
    ///
    /// ```
    /// use batch_import::item::csv::field_set::FieldSet;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Point {
    ///     x: i32,
    ///     label: String,
    /// }
    ///
    /// let field_set = FieldSet::new(
    ///     vec!["x".to_string(), "label".to_string(), "unused".to_string()],
    ///     vec!["3".to_string()],
    /// );
    ///
    /// let point: Point = field_set.deserialize().unwrap();
    /// assert_eq!(point.x, 3);
    /// assert_eq!(point.label, "");
    /// ```
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, BatchError> {
        if self.values.is_empty() {
            return Err(BatchError::Mapping("record has no value".to_string()));
        }

        let headers: StringRecord = self.names.iter().collect();

        self.aligned_values()
            .deserialize(Some(&headers))
            .map_err(|error| BatchError::Mapping(error.to_string()))
    }
}

/// Turns a [`FieldSet`] into an item.
pub trait FieldSetMapper<T> {
    fn map_field_set(&self, field_set: &FieldSet) -> Result<T, BatchError>;
}

/// Maps field sets by name onto any `serde` deserializable type.
#[derive(Default, Clone, Copy)]
pub struct SerdeFieldSetMapper;

impl<T: DeserializeOwned> FieldSetMapper<T> for SerdeFieldSetMapper {
    fn map_field_set(&self, field_set: &FieldSet) -> Result<T, BatchError> {
        field_set.deserialize()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Person {
        id: i64,
        name: String,
        city: String,
    }

    fn field_set(values: &[&str]) -> FieldSet {
        FieldSet::new(
            vec!["id".to_string(), "name".to_string(), "city".to_string()],
            values.iter().map(|value| value.to_string()).collect(),
        )
    }

    #[test]
    fn maps_values_by_name() {
        let person: Person = field_set(&["1", "Ann", "Oslo"]).deserialize().unwrap();

        assert_eq!(
            person,
            Person {
                id: 1,
                name: "Ann".to_string(),
                city: "Oslo".to_string()
            }
        );
    }

    #[test]
    fn missing_values_are_empty_and_extra_values_ignored() {
        let short: Person = field_set(&["2", "Bob"]).deserialize().unwrap();
        assert_eq!(short.city, "");

        let long: Person = field_set(&["3", "Cid", "Rome", "extra", "more"])
            .deserialize()
            .unwrap();
        assert_eq!(long.city, "Rome");
    }

    #[test]
    fn uncoercible_value_is_a_mapping_error() {
        let result: Result<Person, BatchError> = field_set(&["abc", "Ann", "Oslo"]).deserialize();
        assert!(matches!(result, Err(BatchError::Mapping(_))));
    }

    #[test]
    fn empty_record_is_a_mapping_error() {
        let result: Result<Person, BatchError> = field_set(&[]).deserialize();
        assert_eq!(
            result,
            Err(BatchError::Mapping("record has no value".to_string()))
        );
    }

    #[test]
    fn read_string_by_name() {
        let fields = field_set(&["1"]);
        assert_eq!(fields.read_string("id"), Some("1"));
        assert_eq!(fields.read_string("city"), Some(""));
        assert_eq!(fields.read_string("unknown"), None);
    }

    #[test]
    fn serde_mapper_delegates_to_deserialize() {
        let mapper = SerdeFieldSetMapper;
        let person: Person = mapper.map_field_set(&field_set(&["4", "Dan", "Lyon"])).unwrap();
        assert_eq!(person.id, 4);
    }
}
