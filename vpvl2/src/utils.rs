use cgmath::{BaseNum, Euler, InnerSpace, Matrix3, Matrix4, One, Quaternion, Rad, Vector3};
use nalgebra::Isometry3;

pub fn f32x3_to_vec3(v: [f32; 3]) -> Vector3<f32> {
    Vector3::new(v[0], v[1], v[2])
}

/// `[x, y, z, w]` to a quaternion.
pub fn f32x4_to_quat(v: [f32; 4]) -> Quaternion<f32> {
    Quaternion::new(v[3], v[0], v[1], v[2])
}

pub fn mat4_truncate<S>(v: Matrix4<S>) -> Matrix3<S>
where
    S: BaseNum,
{
    Matrix3 {
        x: v.x.truncate(),
        y: v.y.truncate(),
        z: v.z.truncate(),
    }
}

pub fn mat4_translation(v: &Matrix4<f32>) -> Vector3<f32> {
    v.w.truncate()
}

pub fn lerp_f32(a: f32, b: f32, amount: f32) -> f32 {
    a + (b - a) * amount
}

/// Slerp along the shorter arc.
pub fn slerp_shortest(a: Quaternion<f32>, b: Quaternion<f32>, amount: f32) -> Quaternion<f32> {
    let b = if a.dot(b) < 0f32 { -b } else { b };
    if amount <= 0f32 {
        a
    } else if amount >= 1f32 {
        b
    } else {
        a.slerp(b, amount)
    }
}

/// Scales a rotation by `amount` by slerping from identity.
pub fn scale_rotation(orientation: Quaternion<f32>, amount: f32) -> Quaternion<f32> {
    if (amount - 1f32).abs() <= f32::EPSILON {
        orientation
    } else {
        slerp_shortest(Quaternion::one(), orientation, amount)
    }
}

/// Returns a unit quaternion, or identity when the input has no usable length.
pub fn normalize_or_identity(q: Quaternion<f32>) -> Quaternion<f32> {
    let magnitude = q.magnitude();
    if magnitude.is_finite() && magnitude > f32::EPSILON {
        q / magnitude
    } else {
        Quaternion::one()
    }
}

pub fn euler_to_quat(v: Vector3<f32>) -> Quaternion<f32> {
    Quaternion::from(Euler::new(Rad(v.x), Rad(v.y), Rad(v.z)))
}

pub fn to_na_quat(q: Quaternion<f32>) -> nalgebra::UnitQuaternion<f32> {
    let q = normalize_or_identity(q);
    nalgebra::UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(q.s, q.v.x, q.v.y, q.v.z))
}

pub fn from_na_quat(q: &nalgebra::UnitQuaternion<f32>) -> Quaternion<f32> {
    Quaternion::new(q.w, q.i, q.j, q.k)
}

/// Splits a rigid transform into a rapier friendly isometry. Scale is not expected.
pub fn to_isometry(v: Matrix4<f32>) -> Isometry3<f32> {
    let rotation = Quaternion::from(mat4_truncate(v));
    Isometry3::from_parts(
        nalgebra::Translation3::new(v.w.x, v.w.y, v.w.z),
        to_na_quat(rotation),
    )
}

pub fn from_isometry(v: &Isometry3<f32>) -> Matrix4<f32> {
    let t = v.translation.vector;
    Matrix4::from_translation(Vector3::new(t.x, t.y, t.z)) * Matrix4::from(from_na_quat(&v.rotation))
}

/// Inverse of a rotation plus translation matrix.
pub fn rigid_invert(v: &Matrix4<f32>) -> Matrix4<f32> {
    let rotation = mat4_truncate(*v);
    let inverted = cgmath::Matrix::transpose(&rotation);
    let translation = -(inverted * mat4_translation(v));
    let mut result = Matrix4::from(inverted);
    result.w = translation.extend(1f32);
    result
}

#[test]
fn test_slerp_shortest_takes_short_arc() {
    let a = Quaternion::one();
    let b = -Quaternion::<f32>::one();
    let mid = slerp_shortest(a, b, 0.5f32);
    assert!((mid.s.abs() - 1f32).abs() < 1e-5);
}

#[test]
fn test_isometry_round_trip() {
    use cgmath::{Rotation3, Deg};
    let m = Matrix4::from_translation(Vector3::new(1f32, 2f32, 3f32))
        * Matrix4::from(Quaternion::from_angle_y(Deg(30f32)));
    let back = from_isometry(&to_isometry(m));
    for c in 0..4 {
        for r in 0..4 {
            assert!((m[c][r] - back[c][r]).abs() < 1e-5);
        }
    }
    let inverse = rigid_invert(&m) * m;
    for c in 0..4 {
        for r in 0..4 {
            let expected = if c == r { 1f32 } else { 0f32 };
            assert!((inverse[c][r] - expected).abs() < 1e-5);
        }
    }
}
