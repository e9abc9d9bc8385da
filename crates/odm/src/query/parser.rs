//! Method-name derivation.
//!
//! A method name reads `<subject>[Distinct][First<N>|Top<N>]...By<conditions>[OrderBy<orders>]`.
//! The first `By` ends the head, which may hold only `Distinct`, `All`, `First<N>`
//! and `Top<N>`. Conditions and orders start with a capitalized property.
//! Conditions are property references ending in an optional keyword, joined by `And`
//! and `Or`. Connectives fold strictly left to right with no precedence:
//! `findByAOrBAndC` means `(A or B) and C`.
//!
//! Derivation runs once, when a method is registered. Every property reference is
//! resolved against the entity metadata then, so a broken name never reaches a
//! data operation.

use std::sync::Arc;

use crate::error::{OdmError, OdmResult, QueryDerivationError};
use crate::mapping::{EntityMetadata, FieldType, MetadataRegistry, PropertyMetadata, TypeRef};
use crate::types::{Direction, Order};

use super::predicate::{Condition, Operator, Predicate, PropertyPath, QueryMethod, Subject};

const SUBJECTS: &[(&str, Subject)] = &[
    ("find", Subject::Find),
    ("read", Subject::Find),
    ("get", Subject::Find),
    ("query", Subject::Find),
    ("search", Subject::Find),
    ("stream", Subject::Find),
    ("count", Subject::Count),
    ("exists", Subject::Exists),
    ("delete", Subject::Delete),
    ("remove", Subject::Delete),
];

const KEYWORDS: &[(&str, Operator)] = &[
    ("IsGreaterThanEqual", Operator::GreaterThanEqual),
    ("GreaterThanEqual", Operator::GreaterThanEqual),
    ("IsGreaterThan", Operator::GreaterThan),
    ("GreaterThan", Operator::GreaterThan),
    ("IsLessThanEqual", Operator::LessThanEqual),
    ("LessThanEqual", Operator::LessThanEqual),
    ("IsLessThan", Operator::LessThan),
    ("LessThan", Operator::LessThan),
    ("IsBetween", Operator::Between),
    ("Between", Operator::Between),
    ("IsBefore", Operator::Before),
    ("Before", Operator::Before),
    ("IsAfter", Operator::After),
    ("After", Operator::After),
    ("IsLike", Operator::Like),
    ("Like", Operator::Like),
    ("IsStartingWith", Operator::StartingWith),
    ("StartingWith", Operator::StartingWith),
    ("StartsWith", Operator::StartingWith),
    ("IsEndingWith", Operator::EndingWith),
    ("EndingWith", Operator::EndingWith),
    ("EndsWith", Operator::EndingWith),
    ("IsNotContaining", Operator::NotContaining),
    ("NotContaining", Operator::NotContaining),
    ("NotContains", Operator::NotContaining),
    ("IsContaining", Operator::Containing),
    ("Containing", Operator::Containing),
    ("Contains", Operator::Containing),
    ("IsNotIn", Operator::NotIn),
    ("NotIn", Operator::NotIn),
    ("IsIn", Operator::In),
    ("In", Operator::In),
    ("IsTrue", Operator::True),
    ("True", Operator::True),
    ("IsFalse", Operator::False),
    ("False", Operator::False),
    ("IsNotNull", Operator::IsNotNull),
    ("NotNull", Operator::IsNotNull),
    ("IsNull", Operator::IsNull),
    ("Null", Operator::IsNull),
    ("Exists", Operator::Exists),
    ("IsNotEmpty", Operator::IsNotEmpty),
    ("NotEmpty", Operator::IsNotEmpty),
    ("IsEmpty", Operator::IsEmpty),
    ("Empty", Operator::IsEmpty),
    ("MatchesRegex", Operator::Regex),
    ("Matches", Operator::Regex),
    ("Regex", Operator::Regex),
    ("IsWithin", Operator::Within),
    ("Within", Operator::Within),
    ("IsNear", Operator::Near),
    ("Near", Operator::Near),
    ("IsNot", Operator::Negating),
    ("Not", Operator::Negating),
    ("Equals", Operator::Simple),
    ("Is", Operator::Simple),
];

const UNSUPPORTED: &[&str] = &["AllIgnoreCase", "IgnoringCase", "IgnoreCase", "IsNotLike", "NotLike"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connective {
    And,
    Or,
}

/// Derives query methods from method names.
#[derive(Debug, Clone, Copy)]
pub struct MethodNameParser<'a> {
    registry: &'a MetadataRegistry,
}

impl<'a> MethodNameParser<'a> {
    /// Creates a parser resolving nested types through `registry`.
    pub fn new(registry: &'a MetadataRegistry) -> Self {
        Self { registry }
    }

    /// Derives a query method for an entity.
    pub fn derive(&self, method: &str, metadata: &EntityMetadata) -> OdmResult<QueryMethod> {
        let malformed = |message: &str| QueryDerivationError::Malformed {
            method: method.to_string(),
            message: message.to_string(),
        };

        let (prefix, subject) = SUBJECTS
            .iter()
            .find(|(prefix, _)| method.starts_with(prefix))
            .ok_or_else(|| malformed("unknown subject prefix"))?;
        let rest = &method[prefix.len()..];
        if rest.chars().next().is_some_and(|c| !c.is_ascii_uppercase()) {
            return Err(malformed("unknown subject prefix").into());
        }

        let (main, order_clause) = match rest.find("OrderBy") {
            Some(i) => (&rest[..i], Some(&rest[i + "OrderBy".len()..])),
            None => (rest, None),
        };
        let (head, predicate_clause) = match main.find("By") {
            Some(i) => (&main[..i], Some(&main[i + 2..])),
            None => (main, None),
        };
        let (distinct, limit) = parse_head(head).map_err(|m| malformed(&m))?;

        let predicate = match predicate_clause {
            Some("") => return Err(malformed("empty condition after 'By'").into()),
            Some(clause) if !starts_capitalized(clause) => {
                return Err(malformed("condition after 'By' must start with a capitalized property").into());
            }
            Some(clause) => Some(self.parse_predicate(method, clause, metadata)?),
            None => None,
        };

        let sort = match order_clause {
            Some("") => return Err(malformed("empty 'OrderBy' clause").into()),
            Some(clause) if !starts_capitalized(clause) => {
                return Err(malformed("'OrderBy' must be followed by a capitalized property").into());
            }
            Some(clause) => self.parse_orders(method, clause, metadata)?,
            None => Vec::new(),
        };

        Ok(QueryMethod {
            name: method.to_string(),
            subject: *subject,
            distinct,
            limit,
            predicate,
            sort,
        })
    }

    fn parse_predicate(&self, method: &str, clause: &str, metadata: &EntityMetadata) -> OdmResult<Predicate> {
        if let Some(keyword) = UNSUPPORTED.iter().find(|k| clause.contains(*k)) {
            return Err(QueryDerivationError::UnsupportedKeyword {
                method: method.to_string(),
                keyword: keyword.to_string(),
            }
            .into());
        }

        let mut parts = split_connectives(clause).into_iter();
        let Some((_, first)) = parts.next() else {
            return Err(QueryDerivationError::Malformed {
                method: method.to_string(),
                message: "no conditions".to_string(),
            }
            .into());
        };

        let mut predicate = Predicate::Condition(self.parse_condition(method, first, metadata)?);
        for (connective, part) in parts {
            let next = Predicate::Condition(self.parse_condition(method, part, metadata)?);
            predicate = match connective {
                Some(Connective::Or) => predicate.or(next),
                _ => predicate.and(next),
            };
        }
        Ok(predicate)
    }

    fn parse_condition(&self, method: &str, part: &str, metadata: &EntityMetadata) -> OdmResult<Condition> {
        if part.is_empty() {
            return Err(QueryDerivationError::Malformed {
                method: method.to_string(),
                message: "empty condition".to_string(),
            }
            .into());
        }

        let mut keywords: Vec<_> = KEYWORDS.to_vec();
        keywords.sort_by_key(|(keyword, _)| std::cmp::Reverse(keyword.len()));

        let mut resolved = None;
        for (keyword, operator) in keywords {
            if part.len() > keyword.len() && part.ends_with(keyword) {
                let property = &part[..part.len() - keyword.len()];
                if let Some(path) = self.resolve_path(metadata, property)? {
                    resolved = Some((path, operator));
                    break;
                }
            }
        }
        let (path, operator) = match resolved {
            Some(found) => found,
            None => match self.resolve_path(metadata, part)? {
                Some(path) => (path, Operator::Simple),
                None => {
                    return Err(QueryDerivationError::UnknownProperty {
                        method: method.to_string(),
                        property: part.to_string(),
                    }
                    .into());
                }
            },
        };

        if operator.is_geo() && path.field_type() != FieldType::GeoPoint {
            return Err(QueryDerivationError::IncompatibleOperator {
                method: method.to_string(),
                property: path.dotted(),
                operator: operator.to_string(),
                field_type: path.field_type().to_string(),
            }
            .into());
        }

        Ok(Condition { path, operator })
    }

    fn parse_orders(&self, method: &str, clause: &str, metadata: &EntityMetadata) -> OdmResult<Vec<Order>> {
        let mut orders = Vec::new();
        let mut rest = clause;
        while !rest.is_empty() {
            let (property, direction, consumed) = match find_direction(rest) {
                Some((i, direction, len)) => (&rest[..i], direction, i + len),
                None => (rest, Direction::Asc, rest.len()),
            };
            let path = self.resolve_path(metadata, property)?.ok_or_else(|| {
                QueryDerivationError::UnknownProperty {
                    method: method.to_string(),
                    property: property.to_string(),
                }
            })?;
            orders.push(Order {
                property: path.field_path,
                direction,
                missing: None,
            });
            rest = &rest[consumed..];
        }
        Ok(orders)
    }

    /// Resolves a capitalized property reference, descending into embedded types.
    pub fn resolve_path(&self, metadata: &EntityMetadata, reference: &str) -> OdmResult<Option<PropertyPath>> {
        let Some(segments) = self.resolve_segments(metadata, reference)? else {
            return Ok(None);
        };

        let mut field_path = String::new();
        let mut nested_paths = Vec::new();
        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            if !field_path.is_empty() {
                field_path.push('.');
            }
            field_path.push_str(&segment.field_name);
            if i < last && segment.field_type == FieldType::Nested {
                nested_paths.push(field_path.clone());
            }
        }

        let names = segments.iter().map(|s| s.name.clone()).collect();
        let leaf = segments.into_iter().last();
        Ok(leaf.map(|leaf| PropertyPath {
            segments: names,
            field_path,
            nested_paths,
            leaf,
        }))
    }

    fn resolve_segments(&self, metadata: &EntityMetadata, reference: &str) -> OdmResult<Option<Vec<PropertyMetadata>>> {
        if reference.is_empty() {
            return Ok(None);
        }
        if let Some(property) = find_property(metadata, reference) {
            return Ok(Some(vec![property.clone()]));
        }

        let mut splits = Vec::new();
        if let Some(i) = reference.find('_') {
            splits.push((&reference[..i], &reference[i + 1..]));
        }
        for (i, c) in reference.char_indices().skip(1).collect::<Vec<_>>().into_iter().rev() {
            if c.is_ascii_uppercase() {
                splits.push((&reference[..i], &reference[i..]));
            }
        }

        for (head, tail) in splits {
            let Some(property) = find_property(metadata, head) else {
                continue;
            };
            let Some(target) = property.shape.entity() else {
                continue;
            };
            for nested in self.concrete_types(target)? {
                if let Some(mut rest) = self.resolve_segments(&nested, tail)? {
                    rest.insert(0, property.clone());
                    return Ok(Some(rest));
                }
            }
        }
        Ok(None)
    }

    fn concrete_types(&self, target: TypeRef) -> OdmResult<Vec<Arc<EntityMetadata>>> {
        let metadata = self.registry.resolve(target)?;
        if !metadata.is_polymorphic() {
            return Ok(vec![metadata]);
        }
        metadata
            .subtypes()
            .iter()
            .map(|s| self.registry.resolve(s.target).map_err(OdmError::from))
            .collect()
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn find_property<'m>(metadata: &'m EntityMetadata, reference: &str) -> Option<&'m PropertyMetadata> {
    let wanted = normalize(reference);
    metadata
        .properties()
        .iter()
        .filter(|p| !p.transient)
        .find(|p| p.name == reference || normalize(&p.name) == wanted)
}

fn is_boundary(s: &str, at: usize) -> bool {
    s[at..].chars().next().is_none_or(|c| c.is_ascii_uppercase())
}

fn starts_capitalized(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Reads the `Distinct`, `All`, `First<N>` and `Top<N>` modifiers before `By`.
fn parse_head(head: &str) -> Result<(bool, Option<u32>), String> {
    let mut distinct = false;
    let mut limit = None;
    let mut rest = head;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("Distinct") {
            distinct = true;
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("All") {
            rest = tail;
        } else if let Some((keyword, tail)) = ["First", "Top"]
            .into_iter()
            .find_map(|keyword| rest.strip_prefix(keyword).map(|tail| (keyword, tail)))
        {
            if limit.is_some() {
                return Err(format!("more than one limit in '{}'", head));
            }
            let digits = tail.len() - tail.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            limit = Some(match &tail[..digits] {
                "" => 1,
                n => match n.parse::<u32>() {
                    Ok(0) => return Err(format!("{}0 is not a valid limit", keyword)),
                    Ok(n) => n,
                    Err(e) => return Err(e.to_string()),
                },
            });
            rest = &tail[digits..];
        } else {
            return Err(format!("unrecognized '{}' before 'By'", rest));
        }
    }
    Ok((distinct, limit))
}

fn split_connectives(clause: &str) -> Vec<(Option<Connective>, &str)> {
    let mut parts = Vec::new();
    let mut pending = None;
    let mut start = 0;
    let mut i = 1;
    while i < clause.len() {
        let found = [("And", Connective::And), ("Or", Connective::Or)]
            .into_iter()
            .find(|(word, _)| {
                clause.is_char_boundary(i)
                    && clause[i..].starts_with(word)
                    && i + word.len() < clause.len()
                    && is_boundary(clause, i + word.len())
            });
        match found {
            Some((word, connective)) if i > start => {
                parts.push((pending, &clause[start..i]));
                pending = Some(connective);
                i += word.len();
                start = i;
            }
            _ => i += 1,
        }
    }
    parts.push((pending, &clause[start..]));
    parts
}

fn find_direction(s: &str) -> Option<(usize, Direction, usize)> {
    let mut best: Option<(usize, Direction, usize)> = None;
    for (word, direction) in [("Asc", Direction::Asc), ("Desc", Direction::Desc)] {
        let hit = s
            .match_indices(word)
            .map(|(i, _)| i)
            .find(|&i| i > 0 && is_boundary(s, i + word.len()));
        if let Some(i) = hit {
            if best.is_none_or(|(b, _, _)| i < b) {
                best = Some((i, direction, word.len()));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{EntityDescriptor, Mapped, Property, TemporalKind, TypeRef};

    struct Address;
    impl Mapped for Address {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::of::<Self>()
                .property(Property::keyword("city"))
                .property(Property::keyword("zipCode"))
        }
    }

    struct Author;
    impl Mapped for Author {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::of::<Self>()
                .property(Property::text("name"))
                .property(Property::object("address", TypeRef::of::<Address>()))
        }
    }

    struct Book;
    impl Mapped for Book {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::of::<Self>()
                .index("books")
                .property(Property::keyword("id"))
                .property(Property::text("name"))
                .property(Property::integer("price"))
                .property(Property::boolean("available"))
                .property(Property::date("published", TemporalKind::LocalDate))
                .property(Property::geo_point("location"))
                .property(Property::keyword("orderCode"))
                .property(Property::keyword("brandName").field_name("brand"))
                .property(Property::nested("authors", TypeRef::of::<Author>()).collection())
        }
    }

    fn derive(method: &str) -> OdmResult<QueryMethod> {
        let registry = MetadataRegistry::default();
        let metadata = registry.metadata_for::<Book>().unwrap();
        MethodNameParser::new(&registry).derive(method, &metadata)
    }

    fn condition(predicate: &Predicate) -> &Condition {
        match predicate {
            Predicate::Condition(c) => c,
            other => panic!("expected a condition, got {:?}", other),
        }
    }

    #[test]
    fn test_two_conditions_in_order() {
        let method = derive("findByNameAndPrice").unwrap();
        assert_eq!(method.subject, Subject::Find);
        assert_eq!(method.arity(), 2);
        let conditions = method.predicate.as_ref().unwrap().conditions();
        assert_eq!(conditions[0].path.field_path, "name");
        assert_eq!(conditions[1].path.field_path, "price");
        assert_eq!(conditions[0].operator, Operator::Simple);
    }

    #[test]
    fn test_keywords_and_arity() {
        let method = derive("findByPriceBetweenAndAvailableTrue").unwrap();
        let conditions = method.predicate.as_ref().unwrap().conditions();
        assert_eq!(conditions[0].operator, Operator::Between);
        assert_eq!(conditions[1].operator, Operator::True);
        assert_eq!(method.arity(), 2);

        let method = derive("countByPriceGreaterThanEqual").unwrap();
        assert_eq!(method.subject, Subject::Count);
        let c = condition(method.predicate.as_ref().unwrap());
        assert_eq!(c.operator, Operator::GreaterThanEqual);

        let method = derive("existsByNameIsNotNull").unwrap();
        assert_eq!(method.subject, Subject::Exists);
        assert_eq!(method.arity(), 0);
    }

    #[test]
    fn test_left_to_right_fold() {
        let method = derive("findByNameOrPriceAndAvailableFalse").unwrap();
        match method.predicate.unwrap() {
            Predicate::And(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(&children[0], Predicate::Or(inner) if inner.len() == 2));
            }
            other => panic!("unexpected predicate {:?}", other),
        }
    }

    #[test]
    fn test_connectives_inside_property_names() {
        // "Or" inside "OrderCode" and "and" inside "BrandName" are not connectives.
        let method = derive("findByOrderCodeAndBrandName").unwrap();
        let conditions = method.predicate.as_ref().unwrap().conditions();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].path.field_path, "orderCode");
        assert_eq!(conditions[1].path.field_path, "brand");
    }

    #[test]
    fn test_nested_paths() {
        let method = derive("findByAuthorsName").unwrap();
        let c = condition(method.predicate.as_ref().unwrap());
        assert_eq!(c.path.field_path, "authors.name");
        assert_eq!(c.path.nested_paths, vec!["authors".to_string()]);

        let method = derive("findByAuthors_Address_ZipCode").unwrap();
        let c = condition(method.predicate.as_ref().unwrap());
        assert_eq!(c.path.field_path, "authors.address.zipCode");
        assert_eq!(c.path.segments, vec!["authors", "address", "zipCode"]);
    }

    #[test]
    fn test_limit_distinct_and_order() {
        let method = derive("findTop3DistinctByAvailableTrueOrderByPriceDescNameAsc").unwrap();
        assert_eq!(method.limit, Some(3));
        assert!(method.distinct);
        assert_eq!(method.sort, vec![Order::desc("price"), Order::asc("name")]);

        let method = derive("findFirstByName").unwrap();
        assert_eq!(method.limit, Some(1));

        let method = derive("findAllOrderByPrice").unwrap();
        assert!(method.predicate.is_none());
        assert_eq!(method.sort, vec![Order::asc("price")]);
    }

    #[test]
    fn test_failures_at_registration() {
        assert!(matches!(
            derive("findByTitle"),
            Err(OdmError::Query(QueryDerivationError::UnknownProperty { .. }))
        ));
        assert!(matches!(
            derive("findByNameIgnoreCase"),
            Err(OdmError::Query(QueryDerivationError::UnsupportedKeyword { .. }))
        ));
        assert!(matches!(
            derive("findByNameAndPriceAllIgnoreCase"),
            Err(OdmError::Query(QueryDerivationError::UnsupportedKeyword { .. }))
        ));
        assert!(matches!(
            derive("fetchByName"),
            Err(OdmError::Query(QueryDerivationError::Malformed { .. }))
        ));
        assert!(matches!(
            derive("findBy"),
            Err(OdmError::Query(QueryDerivationError::Malformed { .. }))
        ));
        assert!(matches!(
            derive("findByNameWithin"),
            Err(OdmError::Query(QueryDerivationError::IncompatibleOperator { .. }))
        ));
        assert!(derive("findByLocationWithin").is_ok());
    }

    #[test]
    fn test_by_separates_whatever_follows() {
        for method in ["deleteByname", "findByprice", "countByétat", "findAllOrderByprice"] {
            assert!(
                matches!(derive(method), Err(OdmError::Query(QueryDerivationError::Malformed { .. }))),
                "{} should not derive",
                method
            );
        }
        assert!(matches!(
            derive("findByNameAndprice"),
            Err(OdmError::Query(QueryDerivationError::UnknownProperty { .. }))
        ));
    }

    #[test]
    fn test_unrecognized_head_is_rejected() {
        for method in ["findFooBar", "findFooByName", "deleteEverything", "findTop0ByName", "findFirstTop2ByName"] {
            assert!(
                matches!(derive(method), Err(OdmError::Query(QueryDerivationError::Malformed { .. }))),
                "{} should not derive",
                method
            );
        }

        let method = derive("findAllDistinctTop2ByName").unwrap();
        assert!(method.distinct);
        assert_eq!(method.limit, Some(2));
        assert!(derive("findAll").unwrap().predicate.is_none());
    }
}
