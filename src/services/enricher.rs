use crate::models::{User, UserInfo};

pub fn enrich_user(user: &User) -> UserInfo {
    UserInfo {
        user_id: user.user_id.clone(),
        display_name: user.display_name.clone(),
        suspended: user.suspended.unwrap_or(0),
        user_quota: user.user_quota.normalize(),
        bucket_quota: user.bucket_quota.normalize(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quota;

    #[test]
    fn test_enriches_full_record() {
        let raw: User = serde_json::from_str(
            r#"{
                "user_id": "alice",
                "display_name": "Alice",
                "email": "alice@example.com",
                "suspended": 1,
                "max_buckets": 1000,
                "keys": [],
                "user_quota": {
                    "enabled": true,
                    "check_on_raw": false,
                    "max_size": 1073741824,
                    "max_size_kb": 1048576,
                    "max_objects": 5000
                },
                "bucket_quota": {
                    "enabled": false,
                    "max_size_kb": 10,
                    "max_objects": -1
                }
            }"#,
        )
        .unwrap();

        let info = enrich_user(&raw);

        assert_eq!(info.user_id, "alice");
        assert_eq!(info.display_name, "Alice");
        assert_eq!(info.suspended, 1);
        assert_eq!(
            info.user_quota,
            Quota {
                enabled: 1.0,
                max_size_bytes: 1073741824.0,
                max_objects: 5000.0,
            }
        );
        assert_eq!(
            info.bucket_quota,
            Quota {
                enabled: 0.0,
                max_size_bytes: 10240.0,
                max_objects: -1.0,
            }
        );
    }

    #[test]
    fn test_absent_fields_default_to_zero() {
        let raw: User = serde_json::from_str(r#"{"user_id": "bob"}"#).unwrap();

        let info = enrich_user(&raw);

        assert_eq!(info.suspended, 0);
        assert_eq!(info.display_name, "");
        assert_eq!(info.user_quota, Quota::default());
        assert_eq!(info.bucket_quota, Quota::default());
    }
}
