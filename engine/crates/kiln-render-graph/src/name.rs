use std::{borrow::Borrow, fmt, ops::Deref, sync::Arc};

/// 渲染图中资源的名字
///
/// 同一个图实例中每个逻辑资源的名字唯一。内部是 `Arc<str>`，clone 只增加引用计数，
/// 并且实现了 `Borrow<str>`，可以直接用 `&str` 在以 `Name` 为 key 的 map 中查找。
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Arc<str>);

impl Name {
    #[inline]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Name {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Name {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Name {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    #[inline]
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Name {
    #[inline]
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&Name> for Name {
    #[inline]
    fn from(value: &Name) -> Self {
        value.clone()
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(Name::from("gbuffer.albedo"), 1);
        assert_eq!(map.get("gbuffer.albedo"), Some(&1));
        assert_eq!(Name::from(String::from("a")), Name::new("a"));
    }
}
