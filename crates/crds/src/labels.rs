//! Well-known metadata keys
//!
//! Labels, annotations and the finalizer the operator stamps on the objects it
//! manages. Child profiler pods carry the annotations as a weak back-reference
//! to the `PodFlame` that owns them; there is no owner reference between the two
//! because the child lives in a different namespace.

/// API group of the `PodFlame` CRD
pub const API_GROUP: &str = "profilepod.io";

/// Value of the managed-by label on every child pod
pub const OPERATOR_NAME: &str = "profile-pod-operator";

/// Annotation on a profiler pod naming the `PodFlame` it belongs to
pub const ANNOTATION_NAME: &str = "profilepod.io/name";

/// Annotation on a profiler pod naming the namespace of the `PodFlame` it belongs to
pub const ANNOTATION_NAMESPACE: &str = "profilepod.io/namespace";

/// Keeps service-mesh sidecars out of profiler pods
pub const ANNOTATION_SIDECAR_INJECT: &str = "sidecar.istio.io/inject";

/// The instance key for labels (holds the owning `PodFlame` UID)
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";

/// The managed-by key for labels
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Finalizer gating `PodFlame` deletion on child pod cleanup
pub const PODFLAME_FINALIZER: &str = "profilepod.io/finalizer";
